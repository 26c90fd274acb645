//! Request handlers.
//!
//! A handler turns one request into one response. It runs on the task of
//! the connection that received the request, and the same handler serves
//! every connection of a listener at once.

use crate::http::message::HttpMessage;

pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: HttpMessage) -> HttpMessage;
}

impl<F> Handler for F
where
    F: Fn(HttpMessage) -> HttpMessage + Send + Sync + 'static,
{
    fn handle(&self, request: HttpMessage) -> HttpMessage {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Handler for Echo {
        fn handle(&self, request: HttpMessage) -> HttpMessage {
            HttpMessage::response(200, request.content)
        }
    }

    fn run(handler: &dyn Handler, request: HttpMessage) -> HttpMessage {
        handler.handle(request)
    }

    #[test]
    fn closures_and_types_are_handlers() {
        let closure = |req: HttpMessage| HttpMessage::response(201, req.locator.path);
        let mut request = HttpMessage::new();
        request.locator.path = "/items".into();

        let response = run(&closure, request.clone());
        assert_eq!(response.code, 201);
        assert_eq!(response.text(), "/items");

        request.content = "ping".into();
        assert_eq!(run(&Echo, request).text(), "ping");
    }
}
