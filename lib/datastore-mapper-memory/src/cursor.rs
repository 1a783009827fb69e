use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use datastore_mapper::{Cursor, MapperError};

const PREFIX: &str = "offset:";

/// Encode a result offset as an opaque cursor.
pub(crate) fn encode(offset: usize) -> Cursor {
    Cursor::new(URL_SAFE_NO_PAD.encode(format!("{}{}", PREFIX, offset)))
}

/// Decode a cursor produced by [`encode`].
pub(crate) fn decode(cursor: &Cursor) -> Result<usize, MapperError> {
    let invalid = || MapperError::Input(format!("invalid cursor: {}", cursor));

    let bytes = URL_SAFE_NO_PAD
        .decode(cursor.as_str())
        .map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    text.strip_prefix(PREFIX)
        .and_then(|offset| offset.parse::<usize>().ok())
        .ok_or_else(invalid)
}
