use crate::error::SinkError;
use crate::results::ShoeRecord;
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tokio::sync::{Mutex, mpsc};

/// Append-only destination for extracted records
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, record: ShoeRecord) -> Result<(), SinkError>;
}

/// Streams records to a receiver as soon as they are extracted
#[async_trait]
impl RecordSink for mpsc::Sender<ShoeRecord> {
    async fn emit(&self, record: ShoeRecord) -> Result<(), SinkError> {
        self.send(record).await.map_err(|_| SinkError::Closed)
    }
}

/// Export format picked from the output file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Csv,
        }
    }
}

/// In-memory dataset holding records in emission order
#[derive(Debug, Default)]
pub struct Dataset {
    records: Mutex<Vec<ShoeRecord>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Copy of every record emitted so far
    pub async fn records(&self) -> Vec<ShoeRecord> {
        self.records.lock().await.clone()
    }

    /// Render the dataset as CSV with a url,title,price,description header
    pub async fn to_csv_string(&self) -> Result<String, SinkError> {
        let records = self.records.lock().await;
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_csv(&mut writer, &records)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write the dataset to `path`, as JSON for `.json` files and CSV otherwise
    pub async fn export(&self, path: impl AsRef<Path>) -> Result<usize, SinkError> {
        let path = path.as_ref().to_path_buf();
        let records = self.records().await;
        tokio::task::spawn_blocking(move || write_file(&path, &records))
            .await
            .map_err(|e| SinkError::Io(std::io::Error::other(e)))?
    }
}

fn write_file(path: &Path, records: &[ShoeRecord]) -> Result<usize, SinkError> {
    match ExportFormat::from_path(path) {
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_path(path)?;
            write_csv(&mut writer, records)?;
            writer.flush()?;
        }
        ExportFormat::Json => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer.flush()?;
        }
    }
    ::log::info!("Exported {} records to {}", records.len(), path.display());
    Ok(records.len())
}

fn write_csv<W: Write>(
    writer: &mut csv::Writer<W>,
    records: &[ShoeRecord],
) -> Result<(), SinkError> {
    // Serialize writes the header from the first record only, so write it explicitly
    writer.write_record(["url", "title", "price", "description"])?;
    for record in records {
        writer.write_record([
            &record.url,
            &record.title,
            &record.price,
            &record.description,
        ])?;
    }
    Ok(())
}

#[async_trait]
impl RecordSink for Dataset {
    async fn emit(&self, record: ShoeRecord) -> Result<(), SinkError> {
        ::log::debug!("Emitting record for {}", record.url);
        self.records.lock().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: usize, price: &str) -> ShoeRecord {
        ShoeRecord::new(
            format!("https://shop.test/t/{n}"),
            format!("Shoe {n}"),
            price.to_string(),
            "Cushioned, \"fast\" runner".to_string(),
        )
    }

    #[tokio::test]
    async fn test_csv_has_header_even_when_empty() {
        let dataset = Dataset::new();
        assert_eq!(
            dataset.to_csv_string().await.unwrap(),
            "url,title,price,description\n"
        );
    }

    #[tokio::test]
    async fn test_csv_rows_follow_emission_order() {
        let dataset = Dataset::new();
        dataset.emit(record(1, "$100")).await.unwrap();
        dataset.emit(record(2, "")).await.unwrap();

        let csv = dataset.to_csv_string().await.unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            "https://shop.test/t/1,Shoe 1,$100,\"Cushioned, \"\"fast\"\" runner\""
        );
        assert!(lines[2].starts_with("https://shop.test/t/2,Shoe 2,,"));
    }

    #[tokio::test]
    async fn test_export_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::new();
        dataset.emit(record(1, "$100")).await.unwrap();

        let csv_path = dir.path().join("shoes.csv");
        assert_eq!(dataset.export(&csv_path).await.unwrap(), 1);
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert!(csv.starts_with("url,title,price,description\n"));

        let json_path = dir.path().join("shoes.json");
        dataset.export(&json_path).await.unwrap();
        let parsed: Vec<ShoeRecord> =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed, vec![record(1, "$100")]);
    }

    #[tokio::test]
    async fn test_failed_export_leaves_dataset_usable() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::new();
        dataset.emit(record(1, "$100")).await.unwrap();

        let missing = dir.path().join("no-such-dir").join("shoes.csv");
        assert!(dataset.export(&missing).await.is_err());

        // The records lock was not held by the failed write
        dataset.emit(record(2, "$80")).await.unwrap();
        assert_eq!(dataset.len().await, 2);
        assert_eq!(dataset.export(dir.path().join("shoes.csv")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.emit(record(1, "$90")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().title, "Shoe 1");

        drop(rx);
        assert!(matches!(tx.emit(record(2, "")).await, Err(SinkError::Closed)));
    }
}
