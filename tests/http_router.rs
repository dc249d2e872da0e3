//! HTTP adapter scenarios: literal serving over a glob-populated tree.

use std::sync::Arc;

use http::Method;

use polymux::http::{vars, ArcHandler, Request, ResponseWriter, Route, Router};
use polymux::RouterError;

fn get(router: &Router, url: &str) -> ResponseWriter {
    let req = Request::new(Method::GET, url.parse().unwrap());
    let mut w = ResponseWriter::new();
    router.serve(&mut w, &req);
    w
}

fn y_headers(w: &ResponseWriter) -> Vec<String> {
    w.headers()
        .get_all("y")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// A router loaded with the canonical route table; every handler tags the
/// response with its route string.
fn loaded_router() -> Router {
    let router = Router::new();
    let routes = [
        Route::default(),
        Route::path("/"),
        Route::path("/v1"),
        Route::path("/v1/x"),
        Route::path("/v1/*"),
        Route::path("/v[2-3]"),
        Route::path("/v4/**/x"),
        Route::path("/v4/*/**/x"),
    ];
    for route in routes {
        let tag = route.to_string();
        router
            .handle(route, move |w: &mut ResponseWriter, _: &Request| {
                w.headers_mut().append("y", tag.parse().unwrap());
            })
            .unwrap();
    }
    router
}

#[test]
fn match_order_is_specificity_then_patterns() {
    let router = loaded_router();
    let cases: &[(&str, &[&str])] = &[
        ("/", &["* *://**/", "* *://**/**"]),
        ("/v1", &["* *://**/v1", "* *://**/**"]),
        ("/v1/", &["* *://**/v1/*", "* *://**/**"]),
        (
            "/v1/x",
            &["* *://**/v1/x", "* *://**/v1/*", "* *://**/**"],
        ),
        ("/v1/y", &["* *://**/v1/*", "* *://**/**"]),
        ("/v2", &["* *://**/v[2-3]", "* *://**/**"]),
        ("/v4/x", &["* *://**/v4/**/x", "* *://**/**"]),
        (
            "/v4/1/x",
            &["* *://**/v4/*/**/x", "* *://**/v4/**/x", "* *://**/**"],
        ),
        ("/hello", &["* *://**/**"]),
    ];

    for (path, expected) in cases {
        let w = get(&router, &format!("http://localhost{path}"));
        assert_eq!(&y_headers(&w), expected, "path {path}");
    }
}

#[test]
fn routes_lists_every_registration() {
    let router = loaded_router();
    assert_eq!(router.routes().len(), 8);
}

#[test]
fn unmatched_requests_get_404() {
    let router = Router::new();
    router
        .handle(Route::path("/known"), |w: &mut ResponseWriter, _: &Request| {
            w.write(b"hit");
        })
        .unwrap();

    let w = get(&router, "http://localhost/unknown");
    assert_eq!(w.status(), http::StatusCode::NOT_FOUND);

    let w = get(&router, "http://localhost/known");
    assert_eq!(w.status(), http::StatusCode::OK);
    assert_eq!(w.body(), b"hit");
}

#[test]
fn handle_close_cycles_and_dup_detection() {
    let router = Router::new();
    for _ in 0..2 {
        let close = router
            .handle(Route::default(), |_: &mut ResponseWriter, _: &Request| {})
            .unwrap();
        close.close();
    }

    router.set_disable_dup_route(true);
    let _keep = router
        .handle(Route::default(), |_: &mut ResponseWriter, _: &Request| {})
        .unwrap();
    let err = router
        .handle(Route::default(), |_: &mut ResponseWriter, _: &Request| {})
        .unwrap_err();
    assert!(matches!(err, RouterError::ExistedRoute));
}

#[test]
fn vars_expose_path_and_host_captures() {
    let router = Router::new();
    router
        .handle(
            Route {
                host: "*.example.com".into(),
                path: "/pprof/*".into(),
                ..Route::default()
            },
            |w: &mut ResponseWriter, req: &Request| {
                let vars = vars(req);
                w.write(format!("{}|{}", vars.path[1], vars.host[1]).as_bytes());
            },
        )
        .unwrap();

    let w = get(&router, "http://api.example.com/pprof/heap");
    assert_eq!(w.body(), b"heap|api");
}

#[test]
fn vars_capture_wildcard_runs() {
    let router = Router::new();
    router
        .handle(
            Route::path("/v4/**/x"),
            |w: &mut ResponseWriter, req: &Request| {
                w.write(vars(req).path[1].as_bytes());
            },
        )
        .unwrap();

    let w = get(&router, "http://localhost/v4/a/b/c/x");
    assert_eq!(w.body(), b"a/b/c");
}

#[test]
fn middleware_wraps_matched_handlers() {
    let router = Router::new();
    let _mw = router
        .wrap(Route::default(), |next: ArcHandler| -> ArcHandler {
            Arc::new(move |w: &mut ResponseWriter, req: &Request| {
                w.headers_mut().append("trace", "enter".parse().unwrap());
                next.serve_http(w, req);
            })
        })
        .unwrap();
    router
        .handle(Route::path("/v1"), |w: &mut ResponseWriter, _: &Request| {
            w.write(b"body");
        })
        .unwrap();

    let w = get(&router, "http://localhost/v1");
    assert_eq!(w.headers().get("trace").unwrap(), "enter");
    assert_eq!(w.body(), b"body");

    // Middleware alone keeps the 404 fallback wrapped inside it.
    let w = get(&router, "http://localhost/other");
    assert_eq!(w.status(), http::StatusCode::NOT_FOUND);
    assert_eq!(w.headers().get("trace").unwrap(), "enter");
}

#[test]
fn middleware_close_restores_plain_serving() {
    let router = Router::new();
    let mw = router
        .wrap(Route::default(), |next: ArcHandler| -> ArcHandler {
            Arc::new(move |w: &mut ResponseWriter, req: &Request| {
                w.headers_mut().append("trace", "on".parse().unwrap());
                next.serve_http(w, req);
            })
        })
        .unwrap();

    let w = get(&router, "http://localhost/x");
    assert!(w.headers().contains_key("trace"));

    mw.close();
    let w = get(&router, "http://localhost/x");
    assert!(!w.headers().contains_key("trace"));
}

#[test]
fn host_header_serves_origin_form_requests() {
    let router = Router::new();
    router
        .handle(
            Route {
                host: "example.com".into(),
                path: "/x".into(),
                ..Route::default()
            },
            |w: &mut ResponseWriter, _: &Request| {
                w.write(b"matched");
            },
        )
        .unwrap();

    let mut req = Request::new(Method::GET, "/x".parse().unwrap());
    req.headers
        .insert(http::header::HOST, "example.com:8080".parse().unwrap());
    let mut w = ResponseWriter::new();
    router.serve(&mut w, &req);
    assert_eq!(w.body(), b"matched");
}
