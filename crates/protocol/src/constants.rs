/// Magic header opening every frame.
pub const FRAME_MAGIC: &str = "IMG";

/// Field separator in the frame text.
pub const FIELD_DELIMITER: char = '|';

/// Number of fields in a frame: magic, total, index, checksum, payload.
pub const FRAME_FIELD_COUNT: usize = 5;

/// Width of the zero-padded `totalFrames` and `index` fields.
pub const COUNTER_WIDTH: usize = 3;

/// Width of the hex checksum field (4 bytes, uppercase hex).
pub const CHECKSUM_WIDTH: usize = 8;

/// Largest `totalFrames` value that fits the 3-digit counter field.
pub const MAX_TOTAL_FRAMES: usize = 999;

/// Characters of frame text that precede the payload.
///
/// `IMG|007|003|A1B2C3D4|` is 21 characters.
pub const FRAME_HEADER_LEN: usize = FRAME_MAGIC.len() + 2 * COUNTER_WIDTH + CHECKSUM_WIDTH + 4;

/// Byte capacity of the largest QR symbol (version 40) at error-correction
/// level M.
pub const QR_BYTE_CAPACITY_LEVEL_M: usize = 2331;

/// Default base64 characters per data frame.
///
/// A full data frame, header included, fits one version 40 symbol at
/// error-correction level M.
pub const DEFAULT_CHUNK_SIZE: usize = 2300;

/// MIME type assumed when a metadata document omits one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
