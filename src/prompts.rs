//! Instruction prompt sent alongside the uploaded drawing.
//!
//! Callers can override it via [`crate::config::EstimatorConfig::prompt`]; the
//! constant here is used only when no override is provided. The JSON keys the
//! prompt asks for are the ones the table and spreadsheet columns are built
//! around (see [`crate::output::CANONICAL_KEYS`]), so an override should keep them.

/// Default quantity-surveyor prompt.
///
/// The example objects double as a schema: the model copies their keys.
pub const DEFAULT_ESTIMATION_PROMPT: &str = r#"Anda adalah Quantity Surveyor (QS) AI ahli. Tugas anda:
1. Analisis gambar teknik konstruksi yang dilampirkan ini (Skala 1:100 pada A3).
2. Identifikasi elemen pekerjaan (misal: Dinding Bata, Plesteran, Titik Lampu, Stopkontak, Kolom Beton).
3. Lakukan estimasi kuantitas (Volume, Luas, atau Unit) berdasarkan visual.

PENTING: Keluarkan jawaban HANYA dalam format JSON murni tanpa markdown (jangan pakai ```json), dengan struktur:
[
    {"kategori": "Arsitektur", "item": "Dinding Bata Merah", "satuan": "m2", "estimasi_volume": 150, "catatan": "Asumsi tinggi 3m"},
    {"kategori": "MEP", "item": "Titik Lampu", "satuan": "titik", "estimasi_volume": 10, "catatan": "-"}
]"#;

/// The prompt to send for `config`: the override if set, else the default.
pub fn estimation_prompt(config: &crate::config::EstimatorConfig) -> &str {
    config
        .prompt
        .as_deref()
        .unwrap_or(DEFAULT_ESTIMATION_PROMPT)
}
