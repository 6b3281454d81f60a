//! End-to-end dispatch tests: kind sources, resolution and wire output.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::context::DispatchContext;
    use crate::dispatcher::{ErrorDispatcher, ResponseSink, PRODUCTION_INTERNAL_MESSAGE};
    use crate::environment::Environment;
    use crate::kind::{HttpErrorKind, RaisedError, INTERNAL_KIND_NAME};
    use crate::loader::KindLoader;
    use crate::logger::{LogLevel, RecordingLogger};
    use crate::policy::{ErrorOverrides, ErrortyConfig, ResponseEncoding};
    use crate::registry::{ErrorRegistry, LifecycleState};
    use crate::types::Result;

    #[derive(Debug)]
    struct SlowDirectory;

    #[async_trait]
    impl KindLoader for SlowDirectory {
        async fn load(&self, _path: &Path) -> Result<Vec<HttpErrorKind>> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(vec![HttpErrorKind::new("PaymentDeclined", 402, "Payment was declined")])
        }
    }

    #[derive(Default)]
    struct Captured {
        status: u16,
        body: String,
    }

    impl ResponseSink for Captured {
        fn send(&mut self, status_code: u16, _content_type: &str, body: String) {
            self.status = status_code;
            self.body = body;
        }
    }

    #[tokio::test]
    async fn test_directory_kinds_resolve_after_async_initialization() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("PaymentDeclined.json"),
            r#"{"statusCode": 402, "defaultMessage": "Payment was declined"}"#,
        )
        .unwrap();

        let logger = Arc::new(RecordingLogger::default());
        let registry = ErrorRegistry::new(
            ErrortyConfig::new()
                .logger(logger.clone())
                .environment(Environment::Test)
                .error_overrides(ErrorOverrides::default().path(dir.path())),
        );
        let dispatcher = ErrorDispatcher::with_registry(registry);
        dispatcher.initialize(None).await.unwrap();

        let response = dispatcher.dispatch(
            RaisedError::named("PaymentDeclined", ""),
            &DispatchContext::new("POST", "/checkout"),
        );

        assert_eq!(response.status_code, 402);
        assert_eq!(response.envelope.message, "Payment was declined");
        assert!(logger.entries_at(LogLevel::Warn).is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_during_cold_start_keeps_directory_kinds() {
        let logger = Arc::new(RecordingLogger::default());
        let registry = ErrorRegistry::new(
            ErrortyConfig::new()
                .logger(logger.clone())
                .environment(Environment::Test)
                .error_overrides(ErrorOverrides::default().path("/kinds"))
                .kind_loader(Arc::new(SlowDirectory)),
        );
        let dispatcher = ErrorDispatcher::with_registry(registry.clone());
        let ctx = DispatchContext::new("POST", "/checkout");

        let startup = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.initialize(None).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Mid-flight: built-ins resolve, directory kinds are not there yet
        let early = dispatcher.dispatch(RaisedError::named("HTTP_Conflict", "dup"), &ctx);
        assert_eq!(early.status_code, 409);
        let early = dispatcher.dispatch(RaisedError::named("PaymentDeclined", ""), &ctx);
        assert_eq!(early.status_code, 500);
        assert_eq!(registry.state(), LifecycleState::Initializing);
        assert!(logger.contains("initialization is in progress"));

        startup.await.unwrap().unwrap();

        let late = dispatcher.dispatch(RaisedError::named("PaymentDeclined", ""), &ctx);
        assert_eq!(late.status_code, 402);
        assert_eq!(late.envelope.message, "Payment was declined");
        assert_eq!(registry.initialization_count(), 1);
    }

    #[tokio::test]
    async fn test_explicit_list_overrides_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Teapot.json"), r#"{"statusCode": 418}"#).unwrap();

        let registry = ErrorRegistry::new(
            ErrortyConfig::new().environment(Environment::Test).error_overrides(
                ErrorOverrides::default()
                    .path(dir.path())
                    .error(HttpErrorKind::new("Teapot", 503, "Kettle instead")),
            ),
        );
        registry.initialize_async(None).await.unwrap();

        let teapot = registry.resolve_kind("Teapot").unwrap();
        assert_eq!(teapot.status_code, 503);
        assert_eq!(teapot.default_message, "Kettle instead");
    }

    #[test]
    fn test_every_registered_name_dispatches_to_its_status() {
        let registry = ErrorRegistry::new(
            ErrortyConfig::new()
                .logger(Arc::new(RecordingLogger::default()))
                .environment(Environment::Test)
                .custom_error("PaymentDeclined", 402),
        );
        registry.initialize_sync(None);
        let dispatcher = ErrorDispatcher::with_registry(registry.clone());
        let ctx = DispatchContext::new("GET", "/");

        for name in registry.kind_names() {
            let expected = registry.resolve_kind(&name).unwrap().status_code;
            let response = dispatcher.dispatch(RaisedError::named(name.clone(), "failure"), &ctx);
            assert_eq!(response.status_code, expected, "kind {}", name);
        }
    }

    #[test]
    fn test_production_masks_every_internal_message() {
        let registry = ErrorRegistry::new(
            ErrortyConfig::new()
                .logger(Arc::new(RecordingLogger::default()))
                .environment(Environment::Production),
        );
        let dispatcher = ErrorDispatcher::with_registry(registry);
        let ctx = DispatchContext::new("GET", "/reports");

        for (name, message) in [
            ("Error", "Test error"),
            (INTERNAL_KIND_NAME, "connection string postgres://admin@db"),
            ("HttpInternalServerError", ""),
            ("SomethingUnknown", "stack overflow in parser"),
        ] {
            let response = dispatcher.dispatch(RaisedError::named(name, message), &ctx);
            assert_eq!(response.status_code, 500);
            assert_eq!(response.envelope.message, PRODUCTION_INTERNAL_MESSAGE);
        }
    }

    #[test]
    fn test_wire_envelope_through_sink() {
        let registry = ErrorRegistry::new(
            ErrortyConfig::new()
                .logger(Arc::new(RecordingLogger::default()))
                .environment(Environment::Development)
                .log_request_details(false),
        );
        let dispatcher = ErrorDispatcher::with_registry(registry);
        let response = dispatcher.dispatch(
            RaisedError::named("Error", "Test error"),
            &DispatchContext::new("GET", "/test"),
        );

        let mut sink = Captured::default();
        response.write_to(&mut sink).unwrap();

        let body: Value = serde_json::from_str(&sink.body).unwrap();
        assert_eq!(sink.status, 500);
        assert_eq!(body["status"], "error");
        assert_eq!(body["statusCode"], 500);
        assert_eq!(body["message"], "Test error");
        assert_eq!(body["data"], Value::Null);
        assert_eq!(body["error"]["name"], INTERNAL_KIND_NAME);
    }

    #[test]
    fn test_initialization_overrides_apply_to_policy() {
        let registry = ErrorRegistry::new(ErrortyConfig::new().logger(Arc::new(RecordingLogger::default())));
        let dispatcher = ErrorDispatcher::with_registry(registry);

        dispatcher.initialize_sync(Some(
            ErrortyConfig::new()
                .response_encoding(ResponseEncoding::Text)
                .environment(Environment::Staging),
        ));

        let response = dispatcher.not_found(&DispatchContext::new("GET", "/nowhere"));
        assert_eq!(response.encoding, ResponseEncoding::Text);
        assert_eq!(response.body().unwrap(), "Error: Cannot GET /nowhere");
    }
}
