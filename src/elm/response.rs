//! Adapter reply cleanup and error detection

use thiserror::Error;

/// Error replies an ELM327 adapter can send instead of data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("UNABLE TO CONNECT")]
    UnableToConnect,

    #[error("NO DATA")]
    NoData,

    #[error("STOPPED")]
    Stopped,

    #[error("BUS INIT ERROR")]
    BusInit,

    #[error("BUS BUSY")]
    BusBusy,

    #[error("BUFFER FULL")]
    BufferFull,

    #[error("CAN ERROR")]
    CanError,

    #[error("Unknown command")]
    UnknownCommand,

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Malformed response: {0:?}")]
    Malformed(String),
}

/// Strip whitespace, the prompt and protocol search noise from a reply
pub fn clean_response(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '>')
        .collect();

    compact.replace("SEARCHING...", "").replace("BUSINIT:...OK", "")
}

/// Map a cleaned reply to the adapter error it reports, if any
pub fn check_for_errors(cleaned: &str) -> Result<(), ResponseError> {
    let upper = cleaned.to_ascii_uppercase();

    if upper == "?" {
        return Err(ResponseError::UnknownCommand);
    }
    if upper.contains("UNABLETOCONNECT") {
        return Err(ResponseError::UnableToConnect);
    }
    if upper.contains("NODATA") {
        return Err(ResponseError::NoData);
    }
    if upper.contains("STOPPED") {
        return Err(ResponseError::Stopped);
    }
    if upper.contains("BUSINIT") && upper.contains("ERROR") {
        return Err(ResponseError::BusInit);
    }
    if upper.contains("BUSBUSY") {
        return Err(ResponseError::BusBusy);
    }
    if upper.contains("BUFFERFULL") {
        return Err(ResponseError::BufferFull);
    }
    if upper.contains("CANERROR") {
        return Err(ResponseError::CanError);
    }
    if upper.contains("ERROR") {
        return Err(ResponseError::Adapter(cleaned.to_string()));
    }

    Ok(())
}

/// Parse a cleaned hex reply such as `410C1AF8` into bytes
pub fn parse_hex_bytes(cleaned: &str) -> Result<Vec<u8>, ResponseError> {
    if cleaned.is_empty()
        || cleaned.len() % 2 != 0
        || !cleaned.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return Err(ResponseError::Malformed(cleaned.to_string()));
    }

    cleaned
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            // Pairs are ASCII hex digits, checked above
            let text = std::str::from_utf8(pair)
                .map_err(|_| ResponseError::Malformed(cleaned.to_string()))?;
            u8::from_str_radix(text, 16).map_err(|_| ResponseError::Malformed(cleaned.to_string()))
        })
        .collect()
}
