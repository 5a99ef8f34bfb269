//! Decoded samples and their on-disk and sink representations

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone, Utc};
use t7_kwp::{DefinitionError, VariableDefinition};

use crate::sink::LogMessage;

/// Log line timestamp, `DD-MM-YYYY HH:MM:SS.mmm`
const FILE_TIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S%.3f";

/// Sink payload timestamp, `YYYY-MM-DDTHH:MM:SS.mmm±HHMM`
pub(crate) const SINK_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// One variable's value in a sample
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub name: String,
    /// Address, local identifier or symbol number of the variable
    pub number: u32,
    pub raw: i64,
    /// Value with the correction factor applied
    pub value: String,
}

/// Values decoded from one polled reply
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub readings: Vec<Reading>,
    /// Reply bytes left after every variable was decoded
    pub trailing: Vec<u8>,
}

impl Sample {
    /// Decode `data` into one value per variable, in list order
    pub fn decode(
        timestamp: DateTime<Utc>,
        variables: &[VariableDefinition],
        data: &[u8],
    ) -> Result<Self, DefinitionError> {
        let mut cursor = data;
        let readings = variables
            .iter()
            .map(|var| {
                let raw = var.decode(&mut cursor)?;
                Ok(Reading {
                    name: var.name.clone(),
                    number: var.value,
                    raw,
                    value: var.format_value(raw),
                })
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;

        Ok(Self {
            timestamp,
            readings,
            trailing: cursor.to_vec(),
        })
    }

    /// `DD-MM-YYYY HH:MM:SS.mmm|name1=v1|...|IMPORTANTLINE=0|`
    pub fn file_line<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: fmt::Display,
    {
        let mut line = self
            .timestamp
            .with_timezone(tz)
            .format(FILE_TIME_FORMAT)
            .to_string();
        line.push('|');
        for reading in &self.readings {
            line.push_str(&reading.name);
            line.push('=');
            line.push_str(&reading.value);
            line.push('|');
        }
        line.push_str("IMPORTANTLINE=0|");
        line
    }

    /// `YYYY-MM-DDTHH:MM:SS.mmm±HHMM|num1:v1,num2:v2,...`
    pub fn sink_payload<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: fmt::Display,
    {
        let values: Vec<String> = self
            .readings
            .iter()
            .map(|r| format!("{}:{}", r.number, r.value))
            .collect();
        format!(
            "{}|{}",
            self.timestamp.with_timezone(tz).format(SINK_TIME_FORMAT),
            values.join(",")
        )
    }

    pub fn to_message<Tz: TimeZone>(&self, tz: &Tz) -> LogMessage
    where
        Tz::Offset: fmt::Display,
    {
        LogMessage {
            timestamp: self.timestamp,
            payload: self.sink_payload(tz),
        }
    }
}

/// `log-YYYY-MM-DD-HH-MM-SS.t7l`
pub fn log_file_name<Tz: TimeZone>(started: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    format!("log-{}.t7l", started.format("%Y-%m-%d-%H-%M-%S"))
}

/// Append-only log file, one line per sample
pub struct LogFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LogFile {
    /// Create the log file for a run started at `started`
    pub fn create(dir: &Path, started: DateTime<Local>) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(log_file_name(&started));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()
    }
}
