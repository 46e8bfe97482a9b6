use std::sync::Arc;

use axum::{
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    account::{
        list_snippets_handler, login_handler, logout_handler, save_snippet_handler, signup_handler,
    },
    events::sse_handler,
    generate::{generate_handler, source_handler},
    state::AppState,
};

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/events", get(sse_handler))
        .route("/api/generate", post(generate_handler))
        .route("/api/source", get(source_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/signup", post(signup_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route(
            "/api/snippets",
            post(save_snippet_handler).get(list_snippets_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn index_handler() -> impl IntoResponse {
    Html(INDEX_HTML)
}

/// The host page. The preview surface is a sandboxed frame whose
/// content is replaced from the event stream; device presets only
/// change the containment box around it.
const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Wireframe Wizard</title>
    <style>
        body { margin: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0b0b10; color: #d5d7e0; }
        header { padding: 16px 24px; border-bottom: 1px solid #23232e; display: flex; justify-content: space-between; align-items: center; }
        header h1 { margin: 0; font-size: 20px; }
        main { padding: 24px; max-width: 1100px; margin: 0 auto; }
        button { cursor: pointer; border: 1px solid #3a3a4a; background: #181823; color: #d5d7e0; border-radius: 6px; padding: 8px 14px; }
        button.active { background: #4c4cd8; border-color: #4c4cd8; color: #fff; }
        .tabs { display: flex; gap: 4px; border-bottom: 1px solid #23232e; margin-top: 20px; }
        .devices { display: flex; gap: 8px; justify-content: center; margin: 12px 0; }
        .viewport { display: grid; place-items: center; background: #14141c; border: 1px solid #23232e; border-radius: 8px; padding: 16px; min-height: 480px; }
        .frame-box { transition: width .3s, height .3s; width: 100%; height: 600px; max-width: 100%; }
        .frame-box iframe { width: 100%; height: 100%; border: 0; background: #fff; border-radius: 4px; }
        pre { background: #14141c; border: 1px solid #23232e; border-radius: 8px; padding: 16px; overflow: auto; }
        #status { min-height: 20px; color: #e05c5c; margin-top: 8px; white-space: pre-wrap; }
        .auth { display: flex; gap: 8px; align-items: center; }
        .auth input { background: #181823; border: 1px solid #3a3a4a; color: #d5d7e0; border-radius: 6px; padding: 7px 10px; }
        #authStatus { color: #7d8; }
        .hidden { display: none; }
    </style>
</head>
<body>
    <header>
        <h1>Wireframe Wizard</h1>
        <div class="auth">
            <input id="authUser" placeholder="email or username" />
            <input id="authEmail" class="hidden" placeholder="email" />
            <input id="authPass" type="password" placeholder="password" />
            <button id="loginBtn">Log in</button>
            <button id="signupBtn">Sign up</button>
            <button id="logoutBtn" class="hidden">Log out</button>
            <span id="authStatus"></span>
        </div>
    </header>

    <main>
        <div>
            <input type="file" id="sketch" accept="image/png, image/jpeg, image/gif" />
            <button id="generateBtn">Generate</button>
            <button id="saveBtn">Save</button>
        </div>
        <div id="status"></div>

        <div class="tabs">
            <button id="tabPreview" class="active">Live Preview</button>
            <button id="tabCode">Code</button>
        </div>

        <div id="panePreview">
            <div class="devices">
                <button id="devDesktop" class="active">Desktop</button>
                <button id="devTablet">Tablet</button>
                <button id="devMobile">Mobile</button>
            </div>
            <div class="viewport">
                <div class="frame-box" id="frameBox">
                    <iframe id="previewFrame" title="Live Preview" sandbox=""></iframe>
                </div>
            </div>
        </div>

        <div id="paneCode" class="hidden">
            <button id="copyBtn">Copy</button>
            <pre><code id="sourceView"></code></pre>
        </div>
    </main>

    <script>
        const devices = {
            desktop: { width: '100%', height: '600px' },
            tablet: { width: '768px', height: '1024px' },
            mobile: { width: '375px', height: '667px' },
        };

        const frameBox = document.getElementById('frameBox');
        const frame = document.getElementById('previewFrame');
        const statusLine = document.getElementById('status');
        const sourceView = document.getElementById('sourceView');

        const baseStyles = '<style>html,body{margin:0;font-family:sans-serif;}' +
            '.error-container{color:#b91c1c;background:#fee2e2;font-family:monospace;padding:20px;min-height:100vh;box-sizing:border-box;overflow:auto;}' +
            '.error-container h3{margin-top:0;font-family:sans-serif;}' +
            '.error-container pre{white-space:pre-wrap;}</style>';

        function setFrame(html) {
            frame.srcdoc = '<!DOCTYPE html><html><head>' + baseStyles + '</head><body>' + html + '</body></html>';
        }

        function escapeHtml(text) {
            const div = document.createElement('div');
            div.textContent = text;
            return div.innerHTML;
        }

        // Real-time preview events.
        const evtSource = new EventSource('/events');
        evtSource.onmessage = (event) => {
            const payload = JSON.parse(event.data);
            switch (payload.type) {
                case 'cycle_started':
                    statusLine.textContent = '';
                    break;
                case 'cycle_failed':
                    statusLine.textContent = payload.message;
                    break;
                case 'rendered':
                    setFrame(payload.html);
                    break;
                case 'execution_failed':
                    setFrame('<div class="error-container"><h3>Preview Error</h3><pre>' +
                        escapeHtml(payload.message) + '</pre><hr/><h4>Stack Trace:</h4><pre>' +
                        escapeHtml(payload.trace) + '</pre></div>');
                    break;
                case 'ready_timeout':
                    statusLine.textContent = 'The preview sandbox did not become ready in time.';
                    break;
            }
        };

        document.getElementById('generateBtn').onclick = async () => {
            const input = document.getElementById('sketch');
            if (!input.files.length) {
                statusLine.textContent = 'Please upload an image first.';
                return;
            }
            const form = new FormData();
            form.append('sketch', input.files[0]);
            statusLine.textContent = '';
            try {
                const res = await fetch('/api/generate', { method: 'POST', body: form });
                const data = await res.json();
                if (data.error) {
                    statusLine.textContent = data.error;
                } else {
                    sourceView.textContent = data.source;
                }
            } catch (e) {
                statusLine.textContent = 'Generation request failed: ' + e;
            }
        };

        document.getElementById('saveBtn').onclick = async () => {
            const title = prompt('Snippet title');
            if (!title) return;
            const res = await fetch('/api/snippets', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({ title: title, thumbnail: '' }),
            });
            const data = await res.json();
            statusLine.textContent = data.error ? data.error : 'Saved "' + title + '".';
        };

        const authStatus = document.getElementById('authStatus');
        const authEmail = document.getElementById('authEmail');

        function setSignedIn(username) {
            authStatus.textContent = 'Signed in as ' + username;
            for (const id of ['authUser', 'authEmail', 'authPass', 'loginBtn', 'signupBtn']) {
                document.getElementById(id).classList.add('hidden');
            }
            document.getElementById('logoutBtn').classList.remove('hidden');
        }

        async function authCall(path, body) {
            const res = await fetch(path, {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify(body),
            });
            const data = await res.json();
            if (data.error) {
                authStatus.textContent = data.error;
            } else {
                setSignedIn(data.username);
            }
        }

        document.getElementById('loginBtn').onclick = () => authCall('/api/auth/login', {
            email_or_username: document.getElementById('authUser').value,
            password: document.getElementById('authPass').value,
        });

        // Sign up needs the extra email field; the first click reveals
        // it, the second submits.
        document.getElementById('signupBtn').onclick = () => {
            if (authEmail.classList.contains('hidden')) {
                authEmail.classList.remove('hidden');
                authEmail.focus();
                return;
            }
            authCall('/api/auth/signup', {
                email: authEmail.value,
                username: document.getElementById('authUser').value,
                password: document.getElementById('authPass').value,
            });
        };

        document.getElementById('logoutBtn').onclick = async () => {
            await fetch('/api/auth/logout', { method: 'POST' });
            authStatus.textContent = '';
            for (const id of ['authUser', 'authPass', 'loginBtn', 'signupBtn']) {
                document.getElementById(id).classList.remove('hidden');
            }
            document.getElementById('logoutBtn').classList.add('hidden');
        };

        // Copy acknowledgment reverts after a fixed short interval.
        document.getElementById('copyBtn').onclick = () => {
            navigator.clipboard.writeText(sourceView.textContent).then(() => {
                const btn = document.getElementById('copyBtn');
                btn.textContent = 'Copied!';
                setTimeout(() => { btn.textContent = 'Copy'; }, 2000);
            });
        };

        // Device presets only resize the containment box.
        for (const [name, dims] of Object.entries(devices)) {
            const btn = document.getElementById('dev' + name.charAt(0).toUpperCase() + name.slice(1));
            btn.onclick = () => {
                document.querySelectorAll('.devices button').forEach(b => b.classList.remove('active'));
                btn.classList.add('active');
                frameBox.style.width = dims.width;
                frameBox.style.height = dims.height;
            };
        }

        // Tabs.
        const panePreview = document.getElementById('panePreview');
        const paneCode = document.getElementById('paneCode');
        document.getElementById('tabPreview').onclick = () => {
            panePreview.classList.remove('hidden');
            paneCode.classList.add('hidden');
            document.getElementById('tabPreview').classList.add('active');
            document.getElementById('tabCode').classList.remove('active');
        };
        document.getElementById('tabCode').onclick = async () => {
            const res = await fetch('/api/source');
            const data = await res.json();
            if (!data.error) { sourceView.textContent = data.source; }
            paneCode.classList.remove('hidden');
            panePreview.classList.add('hidden');
            document.getElementById('tabCode').classList.add('active');
            document.getElementById('tabPreview').classList.remove('active');
        };
    </script>
</body>
</html>"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::UiEvent;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tower::ServiceExt;
    use wizard_core::assembler::ImagePrompt;
    use wizard_core::generation::{
        GeneratedImage, GenerationError, GenerationService, SketchAnalysis,
    };
    use wizard_core::preview::SourceDocument;

    struct StubGeneration;

    #[async_trait]
    impl GenerationService for StubGeneration {
        async fn analyze_sketch(
            &self,
            _image: &[u8],
            _media_type: &str,
        ) -> Result<SketchAnalysis, GenerationError> {
            Ok(SketchAnalysis {
                template: "ui.mount(ui.image(\"##P1##\", \"hero\"))".to_string(),
                image_prompts: vec![ImagePrompt {
                    placeholder_id: "##P1##".to_string(),
                    prompt: "a hero image".to_string(),
                }],
            })
        }

        async fn synthesize_image(
            &self,
            _prompt: &str,
        ) -> Result<GeneratedImage, GenerationError> {
            Ok(GeneratedImage {
                bytes: vec![1, 2, 3],
                media_type: "image/png".to_string(),
            })
        }
    }

    struct FailingGeneration;

    #[async_trait]
    impl GenerationService for FailingGeneration {
        async fn analyze_sketch(
            &self,
            _image: &[u8],
            _media_type: &str,
        ) -> Result<SketchAnalysis, GenerationError> {
            Err(GenerationError::MalformedAnalysis(
                "unreadable response".to_string(),
            ))
        }

        async fn synthesize_image(
            &self,
            _prompt: &str,
        ) -> Result<GeneratedImage, GenerationError> {
            Err(GenerationError::EmptyImage)
        }
    }

    fn test_state(generation: Arc<dyn GenerationService>) -> Arc<AppState> {
        let config = Config {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            generation_url: "http://localhost:0".to_string(),
            generation_api_key: String::new(),
            account_url: "http://localhost:0".to_string(),
            ready_timeout: Duration::from_secs(5),
        };
        Arc::new(AppState::new(config, generation))
    }

    fn multipart_sketch_request() -> Request<Body> {
        let boundary = "wizard-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"sketch\"; filename=\"sketch.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             not-a-real-png\r\n\
             --{boundary}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_index_page() {
        let state = test_state(Arc::new(StubGeneration));
        let response = app(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8(
            response
                .into_body()
                .collect()
                .await
                .unwrap()
                .to_bytes()
                .to_vec(),
        )
        .unwrap();

        assert!(body.contains("Wireframe Wizard"));
        assert!(body.contains("Live Preview"));
        assert!(body.contains("Tablet"));

        // The auth affordance is wired to the auth endpoints, so saving
        // snippets is reachable from the page.
        assert!(body.contains("id=\"loginBtn\""));
        assert!(body.contains("id=\"signupBtn\""));
        assert!(body.contains("/api/auth/login"));
        assert!(body.contains("/api/auth/signup"));
    }

    #[tokio::test]
    async fn test_source_before_any_generation_is_404() {
        let state = test_state(Arc::new(StubGeneration));
        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/api/source")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generate_cycle_end_to_end() {
        let state = test_state(Arc::new(StubGeneration));
        let mut events = state.events_tx.subscribe();

        let response = app(Arc::clone(&state))
            .oneshot(multipart_sketch_request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let source = body["source"].as_str().unwrap();
        assert!(source.contains("data:image/png;base64,AQID"));
        assert!(!source.contains("##P1##"));

        // The code view serves the same document.
        let response = app(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .uri("/api/source")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["source"].as_str().unwrap(), source);

        // The cycle streamed its events, ending in a real render from
        // the sandboxed host.
        let mut rendered = None;
        for _ in 0..10 {
            match tokio::time::timeout(Duration::from_secs(20), events.recv()).await {
                Ok(Ok(UiEvent::Rendered { html })) => {
                    rendered = Some(html);
                    break;
                }
                Ok(Ok(_)) => continue,
                other => panic!("unexpected event stream end: {other:?}"),
            }
        }
        let html = rendered.expect("no render event observed");
        assert!(html.contains("data:image/png;base64,AQID"));
    }

    #[tokio::test]
    async fn test_generate_without_sketch_is_400() {
        let state = test_state(Arc::new(StubGeneration));
        let boundary = "wizard-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"media_type\"\r\n\r\n\
             image/png\r\n\
             --{boundary}--\r\n"
        );
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/generate")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failed_generation_leaves_previous_document_untouched() {
        let state = test_state(Arc::new(FailingGeneration));
        *state.document.write().await = Some(SourceDocument::new("ui.mount(ui.text(\"old\"))"));

        let response = app(Arc::clone(&state))
            .oneshot(multipart_sketch_request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        // The earlier successful preview's document is still served.
        let current = state.document.read().await.clone().unwrap();
        assert_eq!(current.as_str(), "ui.mount(ui.text(\"old\"))");
    }
}
