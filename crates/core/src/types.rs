/// Server-assigned identifier of a dubbing job. Opaque to the client.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Output kind (e.g. `"video"`, `"audio"`) mapped to a download URL.
pub type ResultUrls = std::collections::HashMap<String, String>;
