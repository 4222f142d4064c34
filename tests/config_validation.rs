// Configuration validation surface: invalid options must fail at open(),
// synchronously, naming the offending field.

use anyhow::Result;
use logsink::{ExtensionColumn, Level, LogEvent, SinkOptions, SqliteSink, StoreLocation};

fn memory_options() -> SinkOptions {
    SinkOptions {
        location: StoreLocation::Memory,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_zero_batch_size_fails_at_open() {
    let options = SinkOptions {
        batch_size: 0,
        ..memory_options()
    };
    let err = SqliteSink::open(options).err().expect("open must fail");
    assert!(err.to_string().contains("batch_size"));
}

#[tokio::test]
async fn test_zero_queue_limit_fails_at_open() {
    let options = SinkOptions {
        queue_limit: Some(0),
        ..memory_options()
    };
    let err = SqliteSink::open(options).err().expect("open must fail");
    assert!(err.to_string().contains("queue_limit"));
}

#[tokio::test]
async fn test_malformed_extension_column_fails_at_open() {
    let options = SinkOptions {
        columns: vec![ExtensionColumn::new("UserId", "TEXT", "")],
        ..memory_options()
    };
    let err = SqliteSink::open(options).err().expect("open must fail");
    assert!(err.to_string().contains("source property"));
}

#[tokio::test]
async fn test_valid_options_open_and_close_cleanly() -> Result<()> {
    let options = SinkOptions {
        minimum_level: Level::Debug,
        queue_limit: None,
        max_rows: Some(1_000),
        ..memory_options()
    };
    let sink = SqliteSink::open(options)?;
    sink.emit(LogEvent::new(Level::Information, "configured"));
    sink.flush().await?;
    assert_eq!(sink.row_count().await?, 1);
    sink.close().await?;
    Ok(())
}
