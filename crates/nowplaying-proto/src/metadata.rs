//! Stream title parsing.

/// Split a raw stream title into `(artist, title)`.
///
/// Splits on `" - "` when present, otherwise on a bare `"-"` (no trimming in
/// either case).  The first segment is the artist and the second the title;
/// anything after a further separator is dropped.  A string with no separator
/// yields the whole string for both fields.
pub fn split_track_metadata(raw: &str) -> (String, String) {
    let sep = if raw.contains(" - ") { " - " } else { "-" };
    let mut parts = raw.split(sep);
    let artist = parts.next().unwrap_or_default().to_string();
    let title = parts.next().map(str::to_string).unwrap_or_else(|| artist.clone());
    (artist, title)
}
