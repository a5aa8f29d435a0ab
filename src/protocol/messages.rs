use std::fmt;

use bytes::Buf;

use crate::error::{PgWireError, Result};

fn need(b: &[u8], n: usize, what: &str) -> Result<()> {
    if b.len() < n {
        return Err(PgWireError::Protocol(format!("{what} truncated")));
    }
    Ok(())
}

fn get_cstr(b: &mut &[u8], what: &str) -> Result<String> {
    let pos = b
        .iter()
        .position(|&x| x == 0)
        .ok_or_else(|| PgWireError::Protocol(format!("unterminated string in {what}")))?;
    let s = String::from_utf8_lossy(&b[..pos]).into_owned();
    *b = &b[pos + 1..];
    Ok(s)
}

/// Fields of an ErrorResponse ('E') or NoticeResponse ('N').
///
/// Only the fields this crate surfaces are kept; everything else in the
/// message (position, file, line, routine, ...) is skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorFields {
    pub severity: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub detail: Option<String>,
    pub hint: Option<String>,
}

impl ErrorFields {
    pub fn parse(payload: &[u8]) -> Self {
        // fields: (code_byte, cstring) ... 0
        let mut b = payload;
        let mut out = ErrorFields::default();
        let mut localized_severity = None;

        while !b.is_empty() {
            let code = b[0];
            b = &b[1..];
            if code == 0 {
                break;
            }
            let Some(pos) = b.iter().position(|&x| x == 0) else {
                break;
            };
            let s = String::from_utf8_lossy(&b[..pos]).into_owned();
            match code {
                // 'V' is never localized, prefer it over 'S'
                b'V' => out.severity = Some(s),
                b'S' => localized_severity = Some(s),
                b'C' => out.code = Some(s),
                b'M' => out.message = Some(s),
                b'D' => out.detail = Some(s),
                b'H' => out.hint = Some(s),
                _ => {}
            }
            b = &b[pos + 1..];
        }

        if out.severity.is_none() {
            out.severity = localized_severity;
        }
        out
    }

    /// `true` for severities that fail the current query (ERROR, FATAL, PANIC).
    pub fn is_error(&self) -> bool {
        matches!(
            self.severity.as_deref(),
            Some("ERROR" | "FATAL" | "PANIC")
        )
    }
}

impl fmt::Display for ErrorFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sev) = &self.severity {
            write!(f, "{sev}: ")?;
        }
        f.write_str(self.message.as_deref().unwrap_or("unknown server error"))?;
        if let Some(code) = &self.code {
            write!(f, " (SQLSTATE {code})")?;
        }
        Ok(())
    }
}

pub fn parse_auth_request(payload: &[u8]) -> Result<(i32, &[u8])> {
    if payload.len() < 4 {
        return Err(PgWireError::Protocol("auth request too short".into()));
    }
    let mut b = payload;
    let code = b.get_i32();
    Ok((code, b))
}

/// One column descriptor from a RowDescription ('T').
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    pub name: String,
    pub table_oid: u32,
    pub column_id: i16,
    pub type_oid: u32,
    pub type_size: i16,
    pub type_modifier: i32,
    pub format: i16,
}

pub fn parse_row_description(payload: &[u8]) -> Result<Vec<FieldDescription>> {
    let mut b = payload;
    need(b, 2, "row description")?;
    let count = b.get_i16();
    if count < 0 {
        return Err(PgWireError::Protocol(format!(
            "negative field count in row description: {count}"
        )));
    }

    let mut fields = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = get_cstr(&mut b, "row description")?;
        // table oid(4) column(2) type oid(4) size(2) modifier(4) format(2)
        need(b, 18, "row description field")?;
        fields.push(FieldDescription {
            name,
            table_oid: b.get_u32(),
            column_id: b.get_i16(),
            type_oid: b.get_u32(),
            type_size: b.get_i16(),
            type_modifier: b.get_i32(),
            format: b.get_i16(),
        });
    }
    Ok(fields)
}

/// Column values of a DataRow ('D'); `None` is SQL NULL.
pub fn parse_data_row(payload: &[u8]) -> Result<Vec<Option<&[u8]>>> {
    let mut b = payload;
    need(b, 2, "data row")?;
    let count = b.get_i16();
    if count < 0 {
        return Err(PgWireError::Protocol(format!(
            "negative column count in data row: {count}"
        )));
    }

    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        need(b, 4, "data row column")?;
        let len = b.get_i32();
        if len == -1 {
            values.push(None);
            continue;
        }
        if len < 0 {
            return Err(PgWireError::Protocol(format!(
                "invalid column length in data row: {len}"
            )));
        }
        let len = len as usize;
        need(b, len, "data row value")?;
        values.push(Some(&b[..len]));
        b = &b[len..];
    }
    Ok(values)
}

pub fn parse_command_complete(payload: &[u8]) -> Result<String> {
    let mut b = payload;
    get_cstr(&mut b, "command complete")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Idle,
    InTransaction,
    Failed,
}

pub fn parse_ready_for_query(payload: &[u8]) -> Result<TransactionStatus> {
    match payload.first() {
        Some(b'I') => Ok(TransactionStatus::Idle),
        Some(b'T') => Ok(TransactionStatus::InTransaction),
        Some(b'E') => Ok(TransactionStatus::Failed),
        Some(other) => Err(PgWireError::Protocol(format!(
            "unknown transaction status in ready for query: {:?}",
            *other as char
        ))),
        None => Err(PgWireError::Protocol("ready for query truncated".into())),
    }
}

pub fn parse_parameter_status(payload: &[u8]) -> Result<(String, String)> {
    let mut b = payload;
    let name = get_cstr(&mut b, "parameter status")?;
    let value = get_cstr(&mut b, "parameter status")?;
    Ok((name, value))
}

/// BackendKeyData ('K'): (process id, secret key).
pub fn parse_backend_key_data(payload: &[u8]) -> Result<(i32, i32)> {
    let mut b = payload;
    need(b, 8, "backend key data")?;
    Ok((b.get_i32(), b.get_i32()))
}
