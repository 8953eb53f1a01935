use std::path::Path;
use thiserror::Error;
use tokio_rusqlite::Connection;
use vigil_core::gallery::check_label;
use vigil_core::{Embedding, Gallery, GalleryEntry, GalleryError};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

/// Dimension of the face encodings produced by the vision sidecar.
pub const EMBEDDING_DIM: usize = 128;
const EMBEDDING_BYTE_LEN: usize = EMBEDDING_DIM * 4;
const NONCE_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] tokio_rusqlite::Error),
    #[error("rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("embedding encryption failed")]
    EncryptionFailed,
    #[error("embedding decryption failed (key mismatch or corrupted data)")]
    DecryptionFailed,
    #[error("invalid embedding blob size: {0} bytes")]
    InvalidBlob(usize),
    #[error("invalid embedding dimension: {0} (expected 128)")]
    InvalidEmbeddingDim(usize),
    #[error("invalid embedding value (NaN/Inf)")]
    InvalidEmbeddingValue,
    #[error("encryption key I/O error: {0}")]
    KeyIo(#[source] std::io::Error),
    #[error("gallery: {0}")]
    Gallery(#[from] GalleryError),
}

/// SQLite-backed enrollment store with AES-256-GCM encrypted embeddings.
///
/// A per-installation 32-byte key is generated at first use and kept next to
/// the database as `.key` (mode 0600). The same database carries the
/// reservation records looked up by contact during result enrichment.
#[derive(Clone)]
pub struct FaceStore {
    conn: Connection,
    enc_key: [u8; 32],
}

impl FaceStore {
    /// Open (or create) the database at the given path and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        let enc_key = if db_path == Path::new(":memory:") {
            // in-memory databases only live for a test run
            [0u8; 32]
        } else {
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent).map_err(StoreError::KeyIo)?;
            }
            let key_path = db_path
                .parent()
                .unwrap_or(Path::new("."))
                .join(".key");
            load_or_generate_key(&key_path)?
        };

        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 CREATE TABLE IF NOT EXISTS faces (
                     id TEXT PRIMARY KEY,
                     label TEXT NOT NULL,
                     contact TEXT,
                     embedding BLOB NOT NULL,
                     created_at TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_faces_label ON faces(label);
                 CREATE TABLE IF NOT EXISTS reservations (
                     id TEXT PRIMARY KEY,
                     contact TEXT NOT NULL,
                     room_id TEXT NOT NULL,
                     check_in_date TEXT NOT NULL,
                     check_out_date TEXT NOT NULL,
                     status TEXT NOT NULL DEFAULT 'confirmed'
                 );
                 CREATE INDEX IF NOT EXISTS idx_reservations_contact ON reservations(contact);",
            )?;
            Ok(())
        })
        .await?;

        tracing::debug!(path = %db_path.display(), "store opened");
        Ok(Self { conn, enc_key })
    }

    /// Enroll one reference embedding. Returns the generated UUID.
    pub async fn insert(
        &self,
        label: &str,
        contact: Option<&str>,
        embedding: &Embedding,
    ) -> Result<String, StoreError> {
        check_label(label)?;
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        // Encrypt before entering the SQLite closure
        let blob = self.encrypt_embedding(&embedding.values)?;

        let id_clone = id.clone();
        let label = label.to_string();
        let contact = contact.map(str::to_string);

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO faces (id, label, contact, embedding, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![id_clone, label, contact, blob, created_at],
                )?;
                Ok(())
            })
            .await?;

        Ok(id)
    }

    /// Every enrolled embedding as gallery entries, oldest first.
    pub async fn load_entries(&self) -> Result<Vec<GalleryEntry>, StoreError> {
        // Fetch raw rows from SQLite; decrypt outside the blocking closure
        let rows: Vec<(String, Option<String>, Vec<u8>)> = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT label, contact, embedding FROM faces ORDER BY created_at, id",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (label, contact, blob) in rows {
            let values = self.decrypt_embedding(&blob)?;
            entries.push(GalleryEntry {
                label,
                embedding: Embedding::new(values),
                contact,
            });
        }
        Ok(entries)
    }

    /// Build a validated, read-only gallery from every enrollment.
    pub async fn load_gallery(&self) -> Result<Gallery, StoreError> {
        Ok(Gallery::new(self.load_entries().await?)?)
    }

    /// List enrollments (metadata only, no embeddings).
    pub async fn list(&self) -> Result<Vec<EnrollmentInfo>, StoreError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, label, contact, created_at
                     FROM faces ORDER BY created_at, id",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(EnrollmentInfo {
                        id: row.get(0)?,
                        label: row.get(1)?,
                        contact: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Remove an enrollment by ID.
    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let affected = conn.execute("DELETE FROM faces WHERE id = ?1", [&id])?;
                Ok(affected > 0)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Count enrolled embeddings.
    pub async fn count_all(&self) -> Result<u64, StoreError> {
        self.conn
            .call(|conn| {
                let count: u64 =
                    conn.query_row("SELECT COUNT(*) FROM faces", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Reservations held by the guest with this contact, by check-in date.
    pub async fn reservations_for_contact(
        &self,
        contact: &str,
    ) -> Result<Vec<Reservation>, StoreError> {
        let contact = contact.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, room_id, check_in_date, check_out_date, status
                     FROM reservations WHERE contact = ?1 ORDER BY check_in_date, id",
                )?;
                let rows = stmt.query_map([&contact], |row| {
                    Ok(Reservation {
                        id: row.get(0)?,
                        room_id: row.get(1)?,
                        check_in_date: row.get(2)?,
                        check_out_date: row.get(3)?,
                        status: row.get(4)?,
                    })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(StoreError::from)
    }

    // ── Encryption helpers ────────────────────────────────────────────────────

    /// Encrypt embedding values with AES-256-GCM.
    ///
    /// Output: 12-byte random nonce || ciphertext || 16-byte GCM tag.
    fn encrypt_embedding(&self, values: &[f32]) -> Result<Vec<u8>, StoreError> {
        validate_embedding_values(values)?;
        let plaintext = embedding_to_bytes(values);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let key = Key::<Aes256Gcm>::from_slice(&self.enc_key);
        let cipher = Aes256Gcm::new(key);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| StoreError::EncryptionFailed)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn decrypt_embedding(&self, blob: &[u8]) -> Result<Vec<f32>, StoreError> {
        if blob.len() <= NONCE_LEN {
            return Err(StoreError::InvalidBlob(blob.len()));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let key = Key::<Aes256Gcm>::from_slice(&self.enc_key);
        let cipher = Aes256Gcm::new(key);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| StoreError::DecryptionFailed)?;

        bytes_to_embedding_strict(&plaintext)
    }
}

// ── Key management ────────────────────────────────────────────────────────────

/// Load the encryption key from disk, or generate and persist a new one.
/// Written with mode 0600 (owner-readable only).
fn load_or_generate_key(key_path: &Path) -> Result<[u8; 32], StoreError> {
    if key_path.exists() {
        let bytes = std::fs::read(key_path).map_err(StoreError::KeyIo)?;
        if bytes.len() != 32 {
            return Err(StoreError::KeyIo(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "encryption key file has wrong length ({} bytes, expected 32)",
                    bytes.len()
                ),
            )));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        tracing::debug!(path = %key_path.display(), "loaded encryption key");
        Ok(key)
    } else {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);

        use std::io::Write;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut f = options.open(key_path).map_err(StoreError::KeyIo)?;
        f.write_all(&key).map_err(StoreError::KeyIo)?;

        tracing::info!(path = %key_path.display(), "generated new AES-256 encryption key");
        Ok(key)
    }
}

// ── Serialization helpers ─────────────────────────────────────────────────────

fn embedding_to_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for &v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding_strict(bytes: &[u8]) -> Result<Vec<f32>, StoreError> {
    if bytes.len() != EMBEDDING_BYTE_LEN {
        return Err(StoreError::InvalidBlob(bytes.len()));
    }

    let mut values = Vec::with_capacity(EMBEDDING_DIM);
    for chunk in bytes.chunks_exact(4) {
        let arr: [u8; 4] = chunk
            .try_into()
            .map_err(|_| StoreError::InvalidBlob(bytes.len()))?;
        let v = f32::from_le_bytes(arr);
        if !v.is_finite() {
            return Err(StoreError::InvalidEmbeddingValue);
        }
        values.push(v);
    }
    Ok(values)
}

fn validate_embedding_values(values: &[f32]) -> Result<(), StoreError> {
    if values.len() != EMBEDDING_DIM {
        return Err(StoreError::InvalidEmbeddingDim(values.len()));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(StoreError::InvalidEmbeddingValue);
    }
    Ok(())
}

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata about one enrollment (no embedding data).
#[derive(Debug, Clone, serde::Serialize)]
pub struct EnrollmentInfo {
    pub id: String,
    pub label: String,
    pub contact: Option<String>,
    pub created_at: String,
}

/// A room reservation attached to a guest contact.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Reservation {
    pub id: String,
    pub room_id: String,
    pub check_in_date: String,
    pub check_out_date: String,
    pub status: String,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
