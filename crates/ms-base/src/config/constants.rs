// =============================================================================
// UPLOAD
// =============================================================================

/// Largest document accepted for analysis (20 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

// =============================================================================
// STREAM FRAMING
// =============================================================================

/// Literal prefix every streamed record line starts with
pub const RECORD_MARKER: &str = "data: ";

/// Read buffer size for the streaming body
pub const STREAM_READ_BUF: usize = 8 * 1024;

// =============================================================================
// API & MODELS
// =============================================================================

/// Default relay endpoint (local web backend)
pub const DEFAULT_RELAY_ENDPOINT: &str = "http://127.0.0.1:5000";

/// Relay route for the streaming analysis
pub const RELAY_ANALYZE_PATH: &str = "/api/analyze";

/// Relay route for the handwriting generation
pub const RELAY_HANDWRITING_PATH: &str = "/api/generate-handwriting";

/// Generative Language API base URL
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for handwriting image generation
pub const HANDWRITING_MODEL: &str = "gemini-2.5-flash-image";

/// Environment variable holding the Gemini key
pub const GEMINI_KEY_VAR: &str = "GEMINI_API_KEY";

/// Fallback message when a non-2xx response carries no error text
pub const API_FAILED_FALLBACK: &str = "API request failed";

// =============================================================================
// EVENT LOOP
// =============================================================================

/// Input poll interval (milliseconds)
pub const EVENT_POLL_MS: u64 = 16;

/// Minimum time between two redraws while streaming (milliseconds)
pub const RENDER_THROTTLE_MS: u64 = 33;

// =============================================================================
// SCROLLING
// =============================================================================

/// Scroll amount for arrow keys
pub const SCROLL_ARROW_AMOUNT: u16 = 3;

/// Scroll amount for PageUp/PageDown
pub const SCROLL_PAGE_AMOUNT: u16 = 20;

// =============================================================================
// STORAGE
// =============================================================================

/// Working directory for logs
pub const STATE_DIR: &str = ".mathscribe";

/// Log file name inside STATE_DIR
pub const LOG_FILE: &str = "mathscribe.log";
