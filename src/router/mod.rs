//! # Router
//! src/router/mod.rs
//!
//! Tabla de rutas `(método, path) → handler`. Los handlers son closures para
//! poder capturar el estado compartido (dispatcher, métricas, coordinador).
//!
//! - Path desconocido: `404`
//! - Path conocido con otro método: `405` con header `Allow`

use crate::http::{Method, Request, Response, StatusCode};

pub type Handler = Box<dyn Fn(&Request) -> Response + Send + Sync>;

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn register<F>(&mut self, method: Method, path: &str, handler: F)
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            handler: Box::new(handler),
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn route(&self, request: &Request) -> Response {
        let mut response = self.dispatch(request);
        add_common_headers(&mut response);
        response
    }

    fn dispatch(&self, request: &Request) -> Response {
        let path = request.path();
        let mut allowed = Vec::new();

        for route in self.routes.iter().filter(|r| r.path == path) {
            if route.method == request.method() {
                return (route.handler)(request);
            }
            allowed.push(route.method.as_str());
        }

        if allowed.is_empty() {
            return Response::error(StatusCode::NotFound, &format!("route not found: {}", path));
        }

        Response::error(
            StatusCode::MethodNotAllowed,
            &format!("method {} not allowed on {}", request.method().as_str(), path),
        )
        .with_header("Allow", &allowed.join(", "))
    }
}

/// Headers presentes en toda respuesta
pub fn add_common_headers(response: &mut Response) {
    response.add_header("Server", concat!("job-dispatcher/", env!("CARGO_PKG_VERSION")));
    response.add_header("Connection", "close");
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(raw: &[u8]) -> Request {
        Request::parse(raw).unwrap()
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.register(Method::GET, "/health", |_| Response::new(StatusCode::Ok));
        router.register(Method::POST, "/jobs", |_| Response::new(StatusCode::Accepted));
        router
    }

    #[test]
    fn test_route_found() {
        let router = router();
        assert_eq!(router.len(), 2);

        let response = router.route(&request(b"GET /health HTTP/1.0\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.header("Connection"), Some("close"));
        assert!(response.header("Server").unwrap().starts_with("job-dispatcher/"));
    }

    #[test]
    fn test_route_not_found() {
        let response = router().route(&request(b"GET /nope HTTP/1.0\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::NotFound);
    }

    #[test]
    fn test_wrong_method_is_405() {
        let response = router().route(&request(b"GET /jobs HTTP/1.0\r\n\r\n"));
        assert_eq!(response.status(), StatusCode::MethodNotAllowed);
        assert_eq!(response.header("Allow"), Some("POST"));
    }

    #[test]
    fn test_handler_captures_state() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let hits = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        let counter = Arc::clone(&hits);
        router.register(Method::GET, "/count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Response::new(StatusCode::Ok)
        });

        router.route(&request(b"GET /count HTTP/1.0\r\n\r\n"));
        router.route(&request(b"GET /count HTTP/1.0\r\n\r\n"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
