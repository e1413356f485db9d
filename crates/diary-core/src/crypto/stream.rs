//! Streaming AES-256-GCM for large payloads.
//!
//! Images are too large to buffer whole, so this module runs the same GCM
//! construction as the one-shot cipher incrementally: the AES-CTR keystream
//! starts at counter 2, GHASH runs over the ciphertext, and the tag is
//! `E(K, J0) XOR GHASH`. A streamed file and a one-shot record are therefore
//! byte-identical on disk: `[ciphertext || tag]` after the salt/IV header,
//! with a single 16-byte tag at the end.

use std::cmp;
use std::io::{self, Read, Write};

use aes::cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher, StreamCipherSeek};
use aes::{Aes256, Block};
use ctr::Ctr32BE;
use ghash::universal_hash::UniversalHash;
use ghash::GHash;
use subtle::ConstantTimeEq;

use crate::crypto::cipher::{Iv, TAG_SIZE};
use crate::crypto::key::DerivedKey;
use crate::error::Result;

/// Chunk size for streaming reads and writes.
const CHUNK_SIZE: usize = 64 * 1024;

/// GHASH block size in bytes.
const GHASH_BLOCK: usize = 16;

type Aes256Ctr = Ctr32BE<Aes256>;

/// Incremental GCM state shared by the encrypting and decrypting paths.
struct GcmCore {
    ctr: Aes256Ctr,
    ghash: GHash,
    tag_mask: Block,
    partial: [u8; GHASH_BLOCK],
    partial_len: usize,
    ct_len: u64,
}

impl GcmCore {
    fn new(key: &DerivedKey, iv: &Iv) -> Self {
        let aes = Aes256::new(key.as_bytes().into());

        // H = E(K, 0^128)
        let mut h = Block::default();
        aes.encrypt_block(&mut h);
        let ghash = GHash::new(&h);

        // J0 = IV || 0^31 || 1 (96-bit IV case)
        let mut j0 = [0u8; 16];
        j0[..12].copy_from_slice(iv.as_bytes());
        j0[15] = 1;

        let mut tag_mask = Block::clone_from_slice(&j0);
        aes.encrypt_block(&mut tag_mask);

        let mut ctr = Aes256Ctr::new(key.as_bytes().into(), &j0.into());
        // Skip the J0 keystream block; data encryption starts at counter 2.
        ctr.seek(16u64);

        Self {
            ctr,
            ghash,
            tag_mask,
            partial: [0u8; GHASH_BLOCK],
            partial_len: 0,
            ct_len: 0,
        }
    }

    fn apply_keystream(&mut self, buf: &mut [u8]) {
        self.ctr.apply_keystream(buf);
    }

    /// Absorb ciphertext bytes into the running GHASH.
    ///
    /// Bytes are buffered to block boundaries so that zero padding is only
    /// ever applied to the final partial block of the whole stream.
    fn absorb(&mut self, mut data: &[u8]) {
        self.ct_len += data.len() as u64;

        if self.partial_len > 0 {
            let take = cmp::min(GHASH_BLOCK - self.partial_len, data.len());
            self.partial[self.partial_len..self.partial_len + take]
                .copy_from_slice(&data[..take]);
            self.partial_len += take;
            data = &data[take..];
            if self.partial_len == GHASH_BLOCK {
                self.ghash.update(&[Block::clone_from_slice(&self.partial)]);
                self.partial_len = 0;
            }
        }

        let full = data.len() - data.len() % GHASH_BLOCK;
        if full > 0 {
            // Exact multiple of the block size: no padding is added.
            self.ghash.update_padded(&data[..full]);
        }

        let rest = &data[full..];
        self.partial[..rest.len()].copy_from_slice(rest);
        self.partial_len = rest.len();
    }

    /// Finish GHASH and produce the 16-byte authentication tag.
    fn finalize(mut self) -> [u8; TAG_SIZE] {
        if self.partial_len > 0 {
            self.ghash.update_padded(&self.partial[..self.partial_len]);
        }

        // Length block: 64-bit AAD bit length (zero, no AAD is used),
        // then 64-bit ciphertext bit length.
        let mut len_block = [0u8; GHASH_BLOCK];
        len_block[8..].copy_from_slice(&(self.ct_len * 8).to_be_bytes());
        self.ghash.update(&[Block::clone_from_slice(&len_block)]);

        let mut tag = self.ghash.finalize();
        for (t, m) in tag.iter_mut().zip(self.tag_mask.iter()) {
            *t ^= m;
        }

        let mut out = [0u8; TAG_SIZE];
        out.copy_from_slice(&tag);
        out
    }
}

/// Encrypt `reader` to `writer` as a single GCM stream.
///
/// The caller writes the salt and IV header first; this function appends
/// the ciphertext chunk by chunk and the 16-byte tag at the end. Only one
/// chunk is held in memory at a time.
///
/// Returns the number of plaintext bytes consumed.
pub fn encrypt_stream<R, W>(
    key: &DerivedKey,
    iv: &Iv,
    reader: &mut R,
    writer: &mut W,
) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut core = GcmCore::new(key, iv);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = read_full(reader, &mut buf)?;
        if n == 0 {
            break;
        }
        let chunk = &mut buf[..n];
        core.apply_keystream(chunk);
        core.absorb(chunk);
        writer.write_all(chunk)?;
        total += n as u64;
        if n < CHUNK_SIZE {
            break;
        }
    }

    writer.write_all(&core.finalize())?;
    Ok(total)
}

/// Read until `buf` is full or EOF; returns the number of bytes read.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Streaming decryptor over a `[ciphertext || tag]` byte stream.
///
/// Wraps the underlying reader after the salt/IV header has been consumed.
/// Plaintext is produced incrementally; the trailing 16 bytes of the stream
/// are withheld as the candidate tag and verified once the underlying
/// reader hits end of stream. A failed verification surfaces as an
/// `InvalidData` I/O error, so a caller that reads to EOF without error has
/// authenticated the whole stream. The outcome is sticky: once the stream
/// has ended, further reads report the same failure again, or `Ok(0)` after
/// a successful verification.
pub struct DecryptingReader<R> {
    inner: R,
    core: Option<GcmCore>,
    held: [u8; TAG_SIZE],
    held_len: usize,
    ready: Vec<u8>,
    ready_pos: usize,
    chunk: Vec<u8>,
    done: bool,
    failure: Option<&'static str>,
}

impl<R: Read> DecryptingReader<R> {
    /// Wrap `inner`, which must be positioned at the start of the
    /// ciphertext (just past the salt/IV header).
    pub fn new(key: &DerivedKey, iv: &Iv, inner: R) -> Self {
        Self {
            inner,
            core: Some(GcmCore::new(key, iv)),
            held: [0u8; TAG_SIZE],
            held_len: 0,
            ready: Vec::new(),
            ready_pos: 0,
            chunk: vec![0u8; CHUNK_SIZE],
            done: false,
            failure: None,
        }
    }

    /// End-of-stream tag check; returns the failure to report, if any.
    fn finish(&mut self) -> Option<&'static str> {
        if self.held_len < TAG_SIZE {
            return Some("encrypted stream truncated before authentication tag");
        }
        let core = self.core.take()?;
        let expected = core.finalize();
        if bool::from(expected.as_slice().ct_eq(&self.held)) {
            None
        } else {
            Some("authentication failed: wrong password or tampered data")
        }
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            if self.ready_pos < self.ready.len() {
                let n = cmp::min(out.len(), self.ready.len() - self.ready_pos);
                out[..n].copy_from_slice(&self.ready[self.ready_pos..self.ready_pos + n]);
                self.ready_pos += n;
                return Ok(n);
            }
            if self.done {
                return match self.failure {
                    Some(msg) => Err(io::Error::new(io::ErrorKind::InvalidData, msg)),
                    None => Ok(0),
                };
            }

            let n = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            if n == 0 {
                // Terminal either way; a retried read reports the same
                // outcome instead of re-running verification.
                self.done = true;
                self.failure = self.finish();
                continue;
            }

            let total = self.held_len + n;
            if total <= TAG_SIZE {
                // Everything seen so far may still be the trailing tag.
                self.held[self.held_len..total].copy_from_slice(&self.chunk[..n]);
                self.held_len = total;
                continue;
            }

            let mut combined = Vec::with_capacity(total);
            combined.extend_from_slice(&self.held[..self.held_len]);
            combined.extend_from_slice(&self.chunk[..n]);

            let release = total - TAG_SIZE;
            self.held.copy_from_slice(&combined[release..]);
            self.held_len = TAG_SIZE;
            combined.truncate(release);

            // Present until the stream goes terminal, which the guard
            // above rules out.
            if let Some(core) = self.core.as_mut() {
                core.absorb(&combined);
                core.apply_keystream(&mut combined);
            }

            self.ready = combined;
            self.ready_pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher;
    use crate::crypto::key::{derive_key, Salt};
    use crate::crypto::password::MasterPassword;

    fn test_key() -> DerivedKey {
        let password = MasterPassword::from("stream-test-password");
        derive_key(&password, &Salt::from_bytes(*b"stream-test-salt")).unwrap()
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_streamed_output_decrypts_with_one_shot_cipher() {
        let key = test_key();
        let iv = Iv::random();
        let plaintext = patterned(10_000);

        let mut encrypted = Vec::new();
        let written =
            encrypt_stream(&key, &iv, &mut plaintext.as_slice(), &mut encrypted).unwrap();
        assert_eq!(written, plaintext.len() as u64);
        assert_eq!(encrypted.len(), plaintext.len() + TAG_SIZE);

        let decrypted = cipher::decrypt(&key, &iv, &encrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_one_shot_output_decrypts_with_streaming_reader() {
        let key = test_key();
        let plaintext = patterned(5_000);

        let (iv, ciphertext) = cipher::encrypt(&key, &plaintext).unwrap();

        let mut reader = DecryptingReader::new(&key, &iv, ciphertext.as_slice());
        let mut decrypted = Vec::new();
        reader.read_to_end(&mut decrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_multi_chunk_round_trip() {
        let key = test_key();
        let iv = Iv::random();
        // Larger than two chunks, not block-aligned.
        let plaintext = patterned(CHUNK_SIZE * 2 + 12_345);

        let mut encrypted = Vec::new();
        encrypt_stream(&key, &iv, &mut plaintext.as_slice(), &mut encrypted).unwrap();

        let mut reader = DecryptingReader::new(&key, &iv, encrypted.as_slice());
        let mut decrypted = Vec::new();
        reader.read_to_end(&mut decrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_empty_stream_round_trip() {
        let key = test_key();
        let iv = Iv::random();

        let mut encrypted = Vec::new();
        encrypt_stream(&key, &iv, &mut io::empty(), &mut encrypted).unwrap();
        assert_eq!(encrypted.len(), TAG_SIZE);

        let mut reader = DecryptingReader::new(&key, &iv, encrypted.as_slice());
        let mut decrypted = Vec::new();
        reader.read_to_end(&mut decrypted).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_tampered_stream_fails() {
        let key = test_key();
        let iv = Iv::random();
        let plaintext = patterned(2_000);

        let mut encrypted = Vec::new();
        encrypt_stream(&key, &iv, &mut plaintext.as_slice(), &mut encrypted).unwrap();
        encrypted[100] ^= 0x01;

        let mut reader = DecryptingReader::new(&key, &iv, encrypted.as_slice());
        let mut decrypted = Vec::new();
        let err = reader.read_to_end(&mut decrypted).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_failure_is_sticky_across_retried_reads() {
        let key = test_key();
        let iv = Iv::random();
        let plaintext = patterned(2_000);

        let mut encrypted = Vec::new();
        encrypt_stream(&key, &iv, &mut plaintext.as_slice(), &mut encrypted).unwrap();
        encrypted[100] ^= 0x01;

        let mut reader = DecryptingReader::new(&key, &iv, encrypted.as_slice());
        let mut decrypted = Vec::new();
        let err = reader.read_to_end(&mut decrypted).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        // Retrying after the failure is legal under the Read contract and
        // must report the same error, not panic or yield data.
        let mut buf = [0u8; 32];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_read_past_clean_end_returns_zero() {
        let key = test_key();
        let iv = Iv::random();
        let plaintext = patterned(500);

        let mut encrypted = Vec::new();
        encrypt_stream(&key, &iv, &mut plaintext.as_slice(), &mut encrypted).unwrap();

        let mut reader = DecryptingReader::new(&key, &iv, encrypted.as_slice());
        let mut decrypted = Vec::new();
        reader.read_to_end(&mut decrypted).unwrap();
        assert_eq!(decrypted, plaintext);

        let mut buf = [0u8; 32];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = test_key();
        let other = derive_key(
            &MasterPassword::from("another-password"),
            &Salt::from_bytes(*b"stream-test-salt"),
        )
        .unwrap();
        let iv = Iv::random();
        let plaintext = patterned(2_000);

        let mut encrypted = Vec::new();
        encrypt_stream(&key, &iv, &mut plaintext.as_slice(), &mut encrypted).unwrap();

        let mut reader = DecryptingReader::new(&other, &iv, encrypted.as_slice());
        let mut decrypted = Vec::new();
        let err = reader.read_to_end(&mut decrypted).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_stream_fails() {
        let key = test_key();
        let iv = Iv::random();

        // Shorter than a tag: cannot possibly authenticate.
        let mut reader = DecryptingReader::new(&key, &iv, &[0u8; 7][..]);
        let mut decrypted = Vec::new();
        let err = reader.read_to_end(&mut decrypted).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_small_destination_reads() {
        let key = test_key();
        let iv = Iv::random();
        let plaintext = patterned(1_000);

        let mut encrypted = Vec::new();
        encrypt_stream(&key, &iv, &mut plaintext.as_slice(), &mut encrypted).unwrap();

        // Drain through a tiny output buffer to exercise partial delivery.
        let mut reader = DecryptingReader::new(&key, &iv, encrypted.as_slice());
        let mut decrypted = Vec::new();
        let mut small = [0u8; 13];
        loop {
            let n = reader.read(&mut small).unwrap();
            if n == 0 {
                break;
            }
            decrypted.extend_from_slice(&small[..n]);
        }
        assert_eq!(decrypted, plaintext);
    }
}
