//! InfluxDB sink using the 1.x HTTP write API.
//!
//! Each reading becomes one point in line protocol with millisecond precision:
//!
//! ```text
//! battery_state voltage=12.61,current=3.2 1700000000123
//! ```
//!
//! Points are buffered up to `batch_size` and posted in one request. A failed
//! request drops its batch; the dispatcher logs the error and sampling goes on.
use crate::config::InfluxSettings;
use crate::core::Sink;
use crate::error::SinkError;
use crate::measurement_types::PhysicalReading;
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Escape a measurement name for line protocol.
fn escape_measurement(name: &str) -> String {
    name.replace(',', "\\,").replace(' ', "\\ ")
}

/// Render one reading as a line-protocol point.
///
/// InfluxDB has no representation for NaN or infinities, so those readings
/// are refused instead of producing a line the server would reject.
pub fn line_protocol(measurement: &str, reading: &PhysicalReading) -> Result<String, SinkError> {
    if !reading.voltage.is_finite() || !reading.current.is_finite() {
        return Err(SinkError::Format(format!(
            "non-finite reading (voltage={}, current={})",
            reading.voltage, reading.current
        )));
    }
    Ok(format!(
        "{} voltage={},current={} {}",
        escape_measurement(measurement),
        reading.voltage,
        reading.current,
        reading.timestamp_millis()
    ))
}

/// Build the `/write` URL with database, retention policy, precision and
/// optional credentials as query parameters.
pub fn write_url(settings: &InfluxSettings) -> Result<Url, SinkError> {
    let mut url = Url::parse(&settings.url)
        .map_err(|e| SinkError::Format(format!("invalid InfluxDB url '{}': {e}", settings.url)))?;

    if url.scheme() != "http" {
        return Err(SinkError::Format(format!(
            "unsupported InfluxDB url scheme '{}', only http is supported",
            url.scheme()
        )));
    }

    url.path_segments_mut()
        .map_err(|_| SinkError::Format(format!("InfluxDB url '{}' cannot be a base", settings.url)))?
        .pop_if_empty()
        .push("write");

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("db", &settings.database)
            .append_pair("rp", &settings.retention_policy)
            .append_pair("precision", "ms");
        if let Some(user) = &settings.username {
            query.append_pair("u", user);
        }
        if let Some(password) = &settings.password {
            query.append_pair("p", password);
        }
    }

    Ok(url)
}

/// Posts readings to an InfluxDB server.
pub struct InfluxSink {
    client: Client<HttpConnector>,
    write_url: Url,
    measurement: String,
    batch_size: usize,
    timeout: Duration,
    pending: Vec<String>,
}

impl InfluxSink {
    /// Build a sink posting to the `/write` endpoint described by `settings`.
    pub fn new(settings: &InfluxSettings) -> Result<Self, SinkError> {
        let write_url = write_url(settings)?;
        info!(
            url = %settings.url,
            database = %settings.database,
            retention_policy = %settings.retention_policy,
            "Connecting to InfluxDB..."
        );

        let batch_size = settings.batch_size.max(1);
        Ok(Self {
            client: Client::new(),
            write_url,
            measurement: settings.measurement.clone(),
            batch_size,
            timeout: Duration::from_millis(settings.timeout_ms),
            pending: Vec::with_capacity(batch_size),
        })
    }

    /// Points waiting for the next request.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let lines = std::mem::take(&mut self.pending);
        let points = lines.len();
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.write_url.as_str())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from(lines.join("\n")))
            .map_err(|e| SinkError::Http(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| SinkError::Http(format!("write timed out after {:?}", self.timeout)))?
            .map_err(|e| SinkError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = hyper::body::to_bytes(response.into_body())
                .await
                .map_err(|e| SinkError::Http(e.to_string()))?;
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }

        debug!(points, status = status.as_u16(), "Wrote points to InfluxDB");
        Ok(())
    }
}

#[async_trait]
impl Sink for InfluxSink {
    fn name(&self) -> &str {
        "influx"
    }

    async fn accept(&mut self, reading: PhysicalReading) -> Result<(), SinkError> {
        let line = line_protocol(&self.measurement, &reading)?;
        self.pending.push(line);
        if self.pending.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn release(&mut self) -> Result<(), SinkError> {
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn reading() -> PhysicalReading {
        PhysicalReading {
            voltage: 12.5,
            current: -3.25,
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        }
    }

    /// Accept one connection, capture the raw request and answer with `status`.
    async fn serve_once(listener: TcpListener, status: &'static str) -> String {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + length {
                    break;
                }
            }
        }
        let response = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
        String::from_utf8(request).unwrap()
    }

    fn settings_for(addr: std::net::SocketAddr) -> InfluxSettings {
        InfluxSettings {
            url: format!("http://{addr}"),
            ..InfluxSettings::default()
        }
    }

    #[test]
    fn line_protocol_uses_millisecond_timestamp() {
        let line = line_protocol("battery_state", &reading()).unwrap();
        assert_eq!(line, "battery_state voltage=12.5,current=-3.25 1700000000123");
    }

    #[test]
    fn line_protocol_escapes_measurement() {
        let line = line_protocol("battery state,a", &reading()).unwrap();
        assert!(line.starts_with("battery\\ state\\,a voltage="));
    }

    #[test]
    fn line_protocol_refuses_nan() {
        let mut bad = reading();
        bad.current = f64::NAN;
        assert!(matches!(
            line_protocol("battery_state", &bad),
            Err(SinkError::Format(_))
        ));
    }

    #[test]
    fn write_url_carries_database_and_credentials() {
        let settings = InfluxSettings {
            url: "http://diskstation.local:8086".to_string(),
            username: Some("logger".to_string()),
            password: Some("p&ss word".to_string()),
            ..InfluxSettings::default()
        };
        let url = write_url(&settings).unwrap();
        assert_eq!(url.path(), "/write");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("db".into(), "tests".into())));
        assert!(pairs.contains(&("rp".into(), "autogen".into())));
        assert!(pairs.contains(&("precision".into(), "ms".into())));
        assert!(pairs.contains(&("u".into(), "logger".into())));
        assert!(pairs.contains(&("p".into(), "p&ss word".into())));
    }

    #[test]
    fn write_url_rejects_https() {
        let settings = InfluxSettings {
            url: "https://influx.example.com".to_string(),
            ..InfluxSettings::default()
        };
        assert!(write_url(&settings).is_err());
    }

    #[tokio::test]
    async fn posts_point_to_write_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener, "204 No Content"));

        let mut sink = InfluxSink::new(&settings_for(addr)).unwrap();
        sink.accept(reading()).await.unwrap();
        assert_eq!(sink.pending(), 0);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /write?db=tests&rp=autogen&precision=ms HTTP/1.1"));
        assert!(request.ends_with("battery_state voltage=12.5,current=-3.25 1700000000123"));
    }

    #[tokio::test]
    async fn server_error_is_reported_as_rejection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener, "500 Internal Server Error"));

        let mut sink = InfluxSink::new(&settings_for(addr)).unwrap();
        let result = sink.accept(reading()).await;
        server.await.unwrap();

        assert!(matches!(result, Err(SinkError::Rejected { status: 500, .. })));
        // The failed batch is dropped rather than retried.
        assert_eq!(sink.pending(), 0);
    }

    #[tokio::test]
    async fn buffers_points_below_batch_size() {
        let settings = InfluxSettings {
            batch_size: 10,
            ..InfluxSettings::default()
        };
        let mut sink = InfluxSink::new(&settings).unwrap();
        sink.accept(reading()).await.unwrap();
        sink.accept(reading()).await.unwrap();
        assert_eq!(sink.pending(), 2);
    }
}
