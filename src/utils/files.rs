use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt, Lines},
};

/// Read a file from the given path into a list of strings
pub async fn read_file(path: &str) -> io::Result<Vec<String>> {
    let mut r = file_reader(path).await?;
    let mut lines = Vec::new();

    while let Some(line) = r.next_line().await? {
        lines.push(line);
    }

    Ok(lines)
}

/// Read a JSON-lines file, skipping blank lines and empty objects. Each record is returned with
/// its 1-based line number.
pub async fn read_json_lines<T: DeserializeOwned>(path: &str) -> Result<Vec<(usize, T)>, JsonLinesError> {
    let lines = read_file(path).await.map_err(|source| JsonLinesError::Io {
        path: path.to_string(),
        source,
    })?;

    let mut records = Vec::with_capacity(lines.len());

    for (index, line) in lines.iter().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|source| JsonLinesError::Json {
                path: path.to_string(),
                line: index + 1,
                source,
            })?;

        if value.is_null() || value.as_object().map(|o| o.is_empty()).unwrap_or(false) {
            continue;
        }

        let record = serde_json::from_value(value).map_err(|source| JsonLinesError::Json {
            path: path.to_string(),
            line: index + 1,
            source,
        })?;

        records.push((index + 1, record));
    }

    Ok(records)
}

/// Write one JSON object per line
pub async fn write_json_lines<T: Serialize>(
    path: &str,
    records: &[T],
) -> Result<(), JsonLinesError> {
    let mut content = String::new();

    for (index, record) in records.iter().enumerate() {
        let line = serde_json::to_string(record).map_err(|source| JsonLinesError::Json {
            path: path.to_string(),
            line: index + 1,
            source,
        })?;

        content.push_str(&line);
        content.push('\n');
    }

    tokio::fs::write(path, content)
        .await
        .map_err(|source| JsonLinesError::Io {
            path: path.to_string(),
            source,
        })
}

async fn file_reader(path: &str) -> io::Result<Lines<io::BufReader<File>>> {
    let f = File::open(path).await?;

    Ok(io::BufReader::new(f).lines())
}

/// JSON-lines reading errors
#[derive(thiserror::Error, Debug)]
pub enum JsonLinesError {
    /// The file could not be read
    #[error("unable to read {path}: {source}")]
    Io {
        /// The input file
        path: String,
        /// The underlying error
        source: io::Error,
    },

    /// A line could not be parsed into, or written from, the expected record
    #[error("invalid record in {path} at line {line}: {source}")]
    Json {
        /// The input file
        path: String,
        /// 1-based line number
        line: usize,
        /// The underlying error
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, PartialEq, serde::Deserialize, Serialize)]
    struct Row {
        id: usize,
        label: String,
    }

    #[tokio::test]
    async fn test_json_lines_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        let path = path.to_str().unwrap();
        let rows = vec![
            Row {
                id: 0,
                label: "news_tech".to_string(),
            },
            Row {
                id: 1,
                label: "news_edu".to_string(),
            },
        ];

        write_json_lines(path, &rows).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "{\"id\":0,\"label\":\"news_tech\"}\n{\"id\":1,\"label\":\"news_edu\"}\n"
        );

        let read: Vec<Row> = read_json_lines(path)
            .await
            .unwrap()
            .into_iter()
            .map(|(_, row)| row)
            .collect();
        assert_eq!(read, rows);
    }
}
