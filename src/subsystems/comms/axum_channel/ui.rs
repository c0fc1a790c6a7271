//! UI route handlers for the axum channel.
//!
//! The root handler serves a single self-contained chat page.  It talks to
//! the `/api/*` routes with `fetch` and keeps the session id in
//! `sessionStorage`, so a reload resumes the same conversation.

use axum::response::Html;

// ── Root page ─────────────────────────────────────────────────────────────────

const ROOT_INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Loan Concierge</title>
  <style>
    *, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: system-ui, -apple-system, sans-serif;
      background: #0f0f0f; color: #e0e0e0;
      display: flex; height: 100vh;
    }
    aside {
      width: 300px; padding: 1.25rem; border-right: 1px solid #333;
      background: #161616; display: flex; flex-direction: column; gap: 0.75rem;
    }
    aside h2 { font-size: 1rem; }
    select, button, input {
      font: inherit; color: inherit; background: #1f1f2a;
      border: 1px solid #333; border-radius: 8px; padding: 0.5rem 0.75rem;
    }
    button { cursor: pointer; background: #2a2a3a; }
    button:hover { background: #3a3a5a; }
    .profile { font-size: 0.85rem; line-height: 1.6; color: #aaa; }
    .hint { font-size: 0.8rem; color: #777; }
    main { flex: 1; display: flex; flex-direction: column; max-width: 820px; margin: 0 auto; }
    header { padding: 1rem 1.5rem; border-bottom: 1px solid #222; }
    header h1 { font-size: 1.25rem; }
    header p { font-size: 0.85rem; color: #888; }
    #log { flex: 1; overflow-y: auto; padding: 1rem 1.5rem; display: flex; flex-direction: column; gap: 0.6rem; }
    .msg { padding: 0.6rem 0.9rem; border-radius: 10px; max-width: 85%; white-space: pre-wrap; line-height: 1.45; }
    .assistant { background: #1a1a24; align-self: flex-start; }
    .user { background: #24324a; align-self: flex-end; }
    .speaker { font-weight: 600; display: block; font-size: 0.8rem; color: #9aa0c0; margin-bottom: 0.2rem; }
    #status { padding: 0 1.5rem; }
    #status a { display: inline-block; margin: 0.5rem 0; padding: 0.5rem 1rem; border-radius: 8px;
                background: #21402a; color: #b8f0c8; text-decoration: none; }
    #status .declined { color: #f0a0a0; margin: 0.5rem 0; }
    form { display: flex; gap: 0.5rem; padding: 1rem 1.5rem; border-top: 1px solid #222; }
    form input { flex: 1; }
  </style>
</head>
<body>
  <aside>
    <h2>👥 Test Customers</h2>
    <select id="customers"></select>
    <div class="profile" id="profile"></div>
    <p class="hint">Use the selected customer's phone number in chat to run an application end to end.</p>
    <button id="reset">Reset conversation</button>
  </aside>
  <main>
    <header>
      <h1>💬 Personal Loan Concierge</h1>
      <p>A master agent coordinating sales, verification, underwriting and sanction. Type <code>restart</code> any time.</p>
    </header>
    <div id="log"></div>
    <div id="status"></div>
    <form id="chat">
      <input id="input" autocomplete="off" placeholder="Type your response" />
      <button type="submit">Send</button>
    </form>
  </main>
  <script>
    const log = document.getElementById('log');
    const status = document.getElementById('status');
    let sessionId = sessionStorage.getItem('session_id');
    let customers = [];

    const inr = (n) => '₹' + Math.round(n).toLocaleString('en-US');

    function render(view) {
      sessionId = view.session_id;
      sessionStorage.setItem('session_id', sessionId);
      log.innerHTML = '';
      for (const m of view.messages) {
        const div = document.createElement('div');
        div.className = 'msg ' + m.role;
        if (m.speaker) {
          const s = document.createElement('span');
          s.className = 'speaker';
          s.textContent = m.icon + ' ' + m.speaker;
          div.appendChild(s);
        }
        div.appendChild(document.createTextNode(m.content));
        log.appendChild(div);
      }
      log.scrollTop = log.scrollHeight;
      status.innerHTML = '';
      if (view.letter_available) {
        const a = document.createElement('a');
        a.href = '/api/sessions/' + sessionId + '/letter';
        a.textContent = '⬇️ Download Sanction Letter (PDF)';
        status.appendChild(a);
      } else if (view.status === 'REJECT') {
        const p = document.createElement('p');
        p.className = 'declined';
        p.textContent = 'Loan application rejected: ' + (view.decline_reason || 'no additional details provided.');
        status.appendChild(p);
      }
    }

    async function api(method, path, body) {
      const res = await fetch(path, {
        method,
        headers: body ? { 'Content-Type': 'application/json' } : {},
        body: body ? JSON.stringify(body) : undefined,
      });
      const json = await res.json();
      if (!res.ok) throw new Error(json.message || res.statusText);
      return json;
    }

    async function openSession() {
      render(await api('POST', '/api/sessions'));
    }

    async function resume() {
      if (!sessionId) return openSession();
      try { render(await api('GET', '/api/sessions/' + sessionId)); }
      catch (_) { await openSession(); }
    }

    function showProfile() {
      const c = customers[document.getElementById('customers').selectedIndex];
      if (!c) return;
      document.getElementById('profile').innerHTML =
        '<b>City:</b> ' + (c.city || '-') + '<br>' +
        '<b>Credit Score:</b> ' + c.credit_score + '<br>' +
        '<b>Pre-approved Limit:</b> ' + inr(c.pre_approved_limit) + '<br>' +
        '<b>Monthly Salary:</b> ' + inr(c.monthly_salary);
    }

    async function loadCustomers() {
      customers = (await api('GET', '/api/customers')).customers;
      const sel = document.getElementById('customers');
      for (const c of customers) {
        const o = document.createElement('option');
        o.textContent = c.name + ' — ' + c.phone;
        sel.appendChild(o);
      }
      sel.addEventListener('change', showProfile);
      showProfile();
    }

    document.getElementById('chat').addEventListener('submit', async (ev) => {
      ev.preventDefault();
      const input = document.getElementById('input');
      const message = input.value.trim();
      if (!message) return;
      input.value = '';
      try {
        render(await api('POST', '/api/message', { message, session_id: sessionId }));
      } catch (e) {
        status.textContent = 'Error: ' + e.message;
      }
    });

    document.getElementById('reset').addEventListener('click', async () => {
      if (!sessionId) return openSession();
      render(await api('POST', '/api/sessions/' + sessionId + '/reset'));
    });

    loadCustomers();
    resume();
  </script>
</body>
</html>
"#;

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET / — the chat page.
pub(super) async fn root() -> Html<&'static str> {
    Html(ROOT_INDEX_HTML)
}
