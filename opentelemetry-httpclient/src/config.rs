use opentelemetry::otel_warn;
use std::env;

/// Record the request query string on the span.
pub(crate) const OTEL_HTTPCLIENT_COLLECT_HTTP_PARAMS: &str = "OTEL_HTTPCLIENT_COLLECT_HTTP_PARAMS";
/// Default for collecting the request query string.
pub(crate) const OTEL_HTTPCLIENT_COLLECT_HTTP_PARAMS_DEFAULT: bool = false;
/// Maximum number of characters of the query string kept on the span.
pub(crate) const OTEL_HTTPCLIENT_HTTP_PARAMS_LENGTH_THRESHOLD: &str =
    "OTEL_HTTPCLIENT_HTTP_PARAMS_LENGTH_THRESHOLD";
/// Default maximum query string length.
pub(crate) const OTEL_HTTPCLIENT_HTTP_PARAMS_LENGTH_THRESHOLD_DEFAULT: usize = 1024;
/// Comma separated list of ports whose calls are neither traced nor propagated.
pub(crate) const OTEL_HTTPCLIENT_PROPAGATION_EXCLUDE_PORTS: &str =
    "OTEL_HTTPCLIENT_PROPAGATION_EXCLUDE_PORTS";

/// Interceptor configuration.
///
/// The default configuration reads the following environment variables:
///
/// * `OTEL_HTTPCLIENT_COLLECT_HTTP_PARAMS`
/// * `OTEL_HTTPCLIENT_HTTP_PARAMS_LENGTH_THRESHOLD`
/// * `OTEL_HTTPCLIENT_PROPAGATION_EXCLUDE_PORTS`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterceptorConfig {
    pub(crate) collect_http_params: bool,
    pub(crate) http_params_length_threshold: usize,
    pub(crate) propagation_exclude_ports: Vec<u16>,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        InterceptorConfig {
            collect_http_params: OTEL_HTTPCLIENT_COLLECT_HTTP_PARAMS_DEFAULT,
            http_params_length_threshold: OTEL_HTTPCLIENT_HTTP_PARAMS_LENGTH_THRESHOLD_DEFAULT,
            propagation_exclude_ports: Vec::new(),
        }
        .init_from_env_vars()
    }
}

impl InterceptorConfig {
    /// Record the request query string as the `url.query` attribute.
    pub fn with_collect_http_params(mut self, collect: bool) -> Self {
        self.collect_http_params = collect;
        self
    }

    /// Set the maximum number of characters of the query string kept on the
    /// span. Longer query strings are cut and suffixed with `...`.
    pub fn with_http_params_length_threshold(mut self, threshold: usize) -> Self {
        self.http_params_length_threshold = threshold;
        self
    }

    /// Calls to these ports are executed untraced and without propagation
    /// headers.
    pub fn with_propagation_exclude_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.propagation_exclude_ports = ports.into_iter().collect();
        self
    }

    pub fn collect_http_params(&self) -> bool {
        self.collect_http_params
    }

    pub fn http_params_length_threshold(&self) -> usize {
        self.http_params_length_threshold
    }

    pub fn propagation_exclude_ports(&self) -> &[u16] {
        &self.propagation_exclude_ports
    }

    pub(crate) fn is_excluded_port(&self, port: u16) -> bool {
        self.propagation_exclude_ports.contains(&port)
    }

    fn init_from_env_vars(mut self) -> Self {
        if let Ok(collect) = env::var(OTEL_HTTPCLIENT_COLLECT_HTTP_PARAMS) {
            match collect.trim().to_ascii_lowercase().parse::<bool>() {
                Ok(collect) => self.collect_http_params = collect,
                Err(_) => {
                    otel_warn!(
                        name: "InterceptorConfig.InvalidCollectHttpParams",
                        message = "OTEL_HTTPCLIENT_COLLECT_HTTP_PARAMS must be 'true' or 'false', using the default",
                        value = collect.as_str()
                    );
                }
            }
        }

        if let Ok(threshold) = env::var(OTEL_HTTPCLIENT_HTTP_PARAMS_LENGTH_THRESHOLD) {
            match threshold.trim().parse::<usize>() {
                Ok(parsed) => self.http_params_length_threshold = parsed,
                Err(_) => {
                    otel_warn!(
                        name: "InterceptorConfig.InvalidHttpParamsLengthThreshold",
                        message = "OTEL_HTTPCLIENT_HTTP_PARAMS_LENGTH_THRESHOLD must be a non-negative integer, using the default",
                        value = threshold.as_str()
                    );
                }
            }
        }

        if let Ok(ports) = env::var(OTEL_HTTPCLIENT_PROPAGATION_EXCLUDE_PORTS) {
            self.propagation_exclude_ports = parse_ports(&ports);
        }

        self
    }
}

fn parse_ports(ports: &str) -> Vec<u16> {
    ports
        .split(',')
        .map(str::trim)
        .filter(|port| !port.is_empty())
        .filter_map(|port| match port.parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                otel_warn!(
                    name: "InterceptorConfig.InvalidExcludePort",
                    message = "Ignoring invalid port in OTEL_HTTPCLIENT_PROPAGATION_EXCLUDE_PORTS",
                    port = port.to_owned()
                );
                None
            }
        })
        .collect()
}
