//! Statically embedded API docs page
//!
//! Self-contained HTML that fetches the OpenAPI document from the server
//! itself and renders a browsable endpoint list. No CDN assets.

pub static DOCS_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>loko API docs</title>
<style>
body { margin: 0; font: 15px/1.6 system-ui, sans-serif; color: #1c1e21; }
main { max-width: 56rem; margin: 0 auto; padding: 2rem 1.25rem; }
h1 { margin-bottom: 0.25rem; }
.endpoint { border: 1px solid #e3e5e8; border-radius: 6px; margin: 0.75rem 0; padding: 0.75rem 1rem; }
.method { display: inline-block; min-width: 3.5rem; font-weight: 700; text-transform: uppercase; }
.method.get { color: #2e7d32; }
.method.post { color: #1565c0; }
code { background: #f2f3f5; padding: 0.1rem 0.3rem; border-radius: 3px; }
pre { background: #f6f7f8; padding: 0.75rem; overflow-x: auto; }
</style>
</head>
<body>
<main>
<h1>loko API</h1>
<p id="meta">Loading specification…</p>
<div id="endpoints"></div>
</main>
<script>
fetch('/api/v1/openapi.json')
  .then(function (res) { return res.json(); })
  .then(function (spec) {
    document.getElementById('meta').textContent =
      spec.info.title + ' v' + spec.info.version + ' — ' + (spec.info.description || '');
    var out = document.getElementById('endpoints');
    Object.keys(spec.paths).forEach(function (path) {
      Object.keys(spec.paths[path]).forEach(function (method) {
        var op = spec.paths[path][method];
        var div = document.createElement('div');
        div.className = 'endpoint';
        var responses = Object.keys(op.responses || {}).map(function (code) {
          return code + ' ' + (op.responses[code].description || '');
        }).join('\n');
        div.innerHTML = '<span class="method ' + method + '">' + method + '</span>' +
          '<code>' + path + '</code><p>' + (op.summary || '') + '</p>' +
          '<pre>' + responses + '</pre>';
        out.appendChild(div);
      });
    });
  })
  .catch(function (err) {
    document.getElementById('meta').textContent = 'Could not load the OpenAPI document: ' + err;
  });
</script>
</body>
</html>
"#;
