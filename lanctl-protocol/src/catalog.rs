//! Status-text tokenizer and the host/process catalog it builds.
//!
//! Grammar:
//!
//! ```text
//! Frame := Entry (':' Entry)*
//! Entry := Host '/' Process '/' Id
//! ```
//!
//! Host and Process exclude `/` and `:`; Id is a decimal integer. Each status
//! frame carries the complete catalog, so the table is rebuilt wholesale and
//! never merged incrementally.

use crate::error::ProtocolError;
use crate::{MAX_HOSTS, MAX_PROCESSES_PER_HOST};

/// One process running on a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub name: String,
    pub id: i32,
}

/// One host row: the host name and its processes in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub name: String,
    pub processes: Vec<ProcessEntry>,
}

/// The host/process table rendered to the operator.
///
/// Host rows are kept in insertion order. Capacity is bounded to
/// [`MAX_HOSTS`] rows of [`MAX_PROCESSES_PER_HOST`] processes each; entries
/// beyond the bound are silently dropped, matching the legacy tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    hosts: Vec<HostEntry>,
}

impl Catalog {
    /// Parses a complete status payload into a fresh catalog.
    ///
    /// Any malformed entry rejects the whole frame; callers drop the frame
    /// and keep reading.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut catalog = Catalog::default();
        if text.is_empty() {
            return Ok(catalog);
        }
        // A well-formed frame may carry a trailing ':' after the last entry.
        let trimmed = text.strip_suffix(':').unwrap_or(text);
        for entry in trimmed.split(':') {
            let (host, process, id) = parse_entry(entry)?;
            catalog.insert(host, process, id);
        }
        Ok(catalog)
    }

    fn insert(&mut self, host: &str, process: &str, id: i32) {
        match self.hosts.iter_mut().find(|h| h.name == host) {
            Some(row) => {
                if row.processes.len() < MAX_PROCESSES_PER_HOST {
                    row.processes.push(ProcessEntry {
                        name: process.to_string(),
                        id,
                    });
                }
            }
            None => {
                if self.hosts.len() < MAX_HOSTS {
                    self.hosts.push(HostEntry {
                        name: host.to_string(),
                        processes: vec![ProcessEntry {
                            name: process.to_string(),
                            id,
                        }],
                    });
                }
            }
        }
    }

    /// Host rows in insertion order.
    pub fn hosts(&self) -> &[HostEntry] {
        &self.hosts
    }

    /// Looks up a host row by name.
    pub fn host(&self, name: &str) -> Option<&HostEntry> {
        self.hosts.iter().find(|h| h.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }
}

fn parse_entry(entry: &str) -> Result<(&str, &str, i32), ProtocolError> {
    let (host, rest) = entry
        .split_once('/')
        .ok_or_else(|| ProtocolError::MalformedEntry(entry.to_string()))?;
    let (process, id_text) = rest
        .split_once('/')
        .ok_or_else(|| ProtocolError::MalformedEntry(entry.to_string()))?;
    if host.is_empty() || process.is_empty() || id_text.contains('/') {
        return Err(ProtocolError::MalformedEntry(entry.to_string()));
    }
    let id: i32 = id_text
        .parse()
        .map_err(|_| ProtocolError::InvalidProcessId(id_text.to_string()))?;
    Ok((host, process, id))
}
