use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("metrics server failed: {0}")]
    Server(std::io::Error),
}

/// Registration-time description of one counter family.
#[derive(Debug, Clone)]
pub struct CounterSpec {
    pub name: String,
    pub help: String,
    /// Variable label names, in schema order.
    pub labels: Vec<String>,
    /// Constant labels rendered on every series of the family.
    pub const_labels: Vec<(String, String)>,
}

/// One registered counter family; incremented per labelled series.
pub trait CounterHandle: Send + Sync {
    fn inc(&self, label_values: &[String]);

    /// Increment with an exemplar attached. Sinks without exemplar support
    /// fall back to a plain increment.
    fn inc_with_exemplar(&self, label_values: &[String], exemplar: &[(String, String)]) {
        let _ = exemplar;
        self.inc(label_values);
    }
}

/// Label-based counter-vector sink the middleware registers its counters
/// with. Implement this to bridge into an external metrics library.
pub trait CounterSink: Send + Sync {
    fn counter(&self, spec: CounterSpec) -> Arc<dyn CounterHandle>;
}

#[derive(Default, Clone)]
struct SeriesCell {
    value: u64,
    // Last exemplar seen for the series, with the observed increment.
    exemplar: Option<(Vec<(String, String)>, u64)>,
}

struct CounterFamily {
    spec: CounterSpec,
    series: Mutex<BTreeMap<Vec<String>, SeriesCell>>,
}

impl CounterFamily {
    fn render_into(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.spec.name, self.spec.help);
        let _ = writeln!(out, "# TYPE {} counter", self.spec.name);
        let series = self.series.lock();
        for (values, cell) in series.iter() {
            out.push_str(&self.spec.name);
            self.render_labels(out, values);
            let _ = write!(out, " {}", cell.value);
            if let Some((exemplar, observed)) = &cell.exemplar {
                out.push_str(" # {");
                for (i, (name, value)) in exemplar.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{}=\"{}\"", name, escape_label_value(value));
                }
                let _ = write!(out, "}} {observed}");
            }
            out.push('\n');
        }
    }

    fn render_labels(&self, out: &mut String, values: &[String]) {
        if self.spec.const_labels.is_empty() && values.is_empty() {
            return;
        }
        out.push('{');
        let mut first = true;
        for (name, value) in &self.spec.const_labels {
            if !first {
                out.push(',');
            }
            first = false;
            let _ = write!(out, "{}=\"{}\"", name, escape_label_value(value));
        }
        for (name, value) in self.spec.labels.iter().zip(values) {
            if !first {
                out.push(',');
            }
            first = false;
            let _ = write!(out, "{}=\"{}\"", name, escape_label_value(value));
        }
        out.push('}');
    }
}

impl CounterHandle for CounterFamily {
    fn inc(&self, label_values: &[String]) {
        let mut series = self.series.lock();
        let cell = series.entry(label_values.to_vec()).or_default();
        cell.value = cell.value.saturating_add(1);
    }

    fn inc_with_exemplar(&self, label_values: &[String], exemplar: &[(String, String)]) {
        let mut series = self.series.lock();
        let cell = series.entry(label_values.to_vec()).or_default();
        cell.value = cell.value.saturating_add(1);
        cell.exemplar = Some((exemplar.to_vec(), 1));
    }
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Default [`CounterSink`]: keeps counters in memory and renders them in
/// Prometheus text exposition format, with exemplars in OpenMetrics trailer
/// syntax. A small TCP loop serves `GET /metrics` for scraping.
#[derive(Default)]
pub struct TextRegistry {
    families: Mutex<Vec<Arc<CounterFamily>>>,
}

impl TextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of one series, by ordered label values. Intended for
    /// tests and introspection.
    pub fn value(&self, name: &str, label_values: &[&str]) -> Option<u64> {
        let families = self.families.lock();
        let family = families.iter().find(|f| f.spec.name == name)?;
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        let series = family.series.lock();
        series.get(&key).map(|cell| cell.value)
    }

    /// Number of live series in one family.
    pub fn series_count(&self, name: &str) -> usize {
        let families = self.families.lock();
        families
            .iter()
            .find(|f| f.spec.name == name)
            .map_or(0, |f| f.series.lock().len())
    }

    /// Renders all families in registration order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let families = self.families.lock();
        for family in families.iter() {
            family.render_into(&mut out);
        }
        out
    }

    /// Serves `GET /metrics` on `addr` until the task is aborted.
    pub async fn spawn_metrics_server(
        self: Arc<Self>,
        addr: SocketAddr,
    ) -> Result<tokio::task::JoinHandle<()>, ScrapeError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ScrapeError::Server)?;
        Ok(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, _)) => {
                        let registry = self.clone();
                        tokio::spawn(async move {
                            serve_scrape(registry, socket).await;
                        });
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        tracing::error!(error = %err, "metrics server accept failed");
                        break;
                    }
                }
            }
        }))
    }
}

impl CounterSink for TextRegistry {
    fn counter(&self, spec: CounterSpec) -> Arc<dyn CounterHandle> {
        let family = Arc::new(CounterFamily {
            spec,
            series: Mutex::new(BTreeMap::new()),
        });
        self.families.lock().push(family.clone());
        family
    }
}

async fn serve_scrape(registry: Arc<TextRegistry>, mut socket: tokio::net::TcpStream) {
    let mut buf = vec![0_u8; 2048];
    match socket.read(&mut buf).await {
        Ok(n) if n > 0 => {
            let request = String::from_utf8_lossy(&buf[..n]);
            let (status, body) = if request.starts_with("GET /metrics ") {
                ("200 OK", registry.render())
            } else {
                ("404 Not Found", "not found".to_string())
            };
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: text/plain; version=0.0.4\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(error = %err, "metrics socket read failed");
        }
    }
}
