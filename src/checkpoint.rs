//! Checkpoint Serialization
//!
//! Reads and writes the binary model format: a 256-slot header of
//! little-endian i32 values followed by the flat parameter arena as
//! little-endian f32, in declared tensor order.
//!
//! ```text
//! header[0] = 20240326   magic
//! header[1] = 3          version
//! header[2] = max_seq_len
//! header[3] = vocab_size
//! header[4] = num_layers
//! header[5] = num_heads
//! header[6] = channels
//! header[7] = padded_vocab_size
//! ```
//!
//! Unused header slots are zero. A wrong magic or version is reported as
//! [`std::io::ErrorKind::InvalidData`] rather than a panic, since the
//! bytes come from outside the process.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::config::Config;
use crate::layout::ParameterLayout;
use crate::model::Gpt2;

const HEADER_SLOTS: usize = 256;
const MAGIC: i32 = 20240326;
const VERSION: i32 = 3;

/// Write a model checkpoint to `path`
pub fn save(model: &Gpt2, path: impl AsRef<Path>) -> io::Result<()> {
    let config = model.config();
    let mut writer = BufWriter::new(File::create(path.as_ref())?);

    let mut header = [0i32; HEADER_SLOTS];
    header[0] = MAGIC;
    header[1] = VERSION;
    header[2] = config.max_seq_len as i32;
    header[3] = config.vocab_size as i32;
    header[4] = config.num_layers as i32;
    header[5] = config.num_heads as i32;
    header[6] = config.channels as i32;
    header[7] = config.padded_vocab_size as i32;
    for slot in header {
        writer.write_all(&slot.to_le_bytes())?;
    }

    for &param in model.parameters() {
        writer.write_all(&param.to_le_bytes())?;
    }
    writer.flush()?;

    println!(
        "saved checkpoint: {} parameters ({} layers, {} channels)",
        model.num_parameters(),
        config.num_layers,
        config.channels
    );
    Ok(())
}

/// Load a model checkpoint from `path`
pub fn load(path: impl AsRef<Path>) -> io::Result<Gpt2> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);

    let mut header = [0i32; HEADER_SLOTS];
    let mut buf = [0u8; 4];
    for slot in header.iter_mut() {
        reader.read_exact(&mut buf)?;
        *slot = i32::from_le_bytes(buf);
    }

    if header[0] != MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("bad checkpoint magic {:#x}", header[0]),
        ));
    }
    if header[1] != VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported checkpoint version {}", header[1]),
        ));
    }
    // A negative dimension would wrap to a huge usize in the cast below
    if header[2..8].iter().any(|&dim| dim < 0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("negative dimension in checkpoint header: {:?}", &header[2..8]),
        ));
    }

    let config = Config {
        max_seq_len: header[2] as usize,
        vocab_size: header[3] as usize,
        num_layers: header[4] as usize,
        num_heads: header[5] as usize,
        channels: header[6] as usize,
        padded_vocab_size: header[7] as usize,
    };
    config.assert_valid();

    let layout = ParameterLayout::new(&config);
    let mut params = vec![0.0f32; layout.total];
    for param in params.iter_mut() {
        reader.read_exact(&mut buf)?;
        *param = f32::from_le_bytes(buf);
    }

    println!(
        "loaded checkpoint: {} parameters ({} layers, {} channels, vocab {})",
        layout.total, config.num_layers, config.channels, config.vocab_size
    );
    Ok(Gpt2::from_parameters(&config, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("touchstone-{}-{}", std::process::id(), name));
        path
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let config = Config::tiny(16);
        let model = Gpt2::random(&config, 7);
        let path = temp_path("roundtrip.bin");

        save(&model, &path).unwrap();
        let restored = load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(restored.config(), model.config());
        assert_eq!(restored.parameters(), model.parameters());
    }

    #[test]
    fn test_round_trip_preserves_forward_output() {
        let config = Config::tiny(16);
        let mut model = Gpt2::random(&config, 9);
        let path = temp_path("forward.bin");

        save(&model, &path).unwrap();
        let mut restored = load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let inputs = [2usize, 7, 1, 0];
        let targets = [7usize, 1, 0, 2];
        let l1 = model.forward(&inputs, Some(&targets), 1, 4);
        let l2 = restored.forward(&inputs, Some(&targets), 1, 4);
        assert_eq!(l1, l2);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let path = temp_path("badmagic.bin");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&12345i32.to_le_bytes());
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.resize(HEADER_SLOTS * 4, 0);
        std::fs::write(&path, &bytes).unwrap();

        let err = load(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_bad_version_rejected() {
        let path = temp_path("badversion.bin");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&99i32.to_le_bytes());
        bytes.resize(HEADER_SLOTS * 4, 0);
        std::fs::write(&path, &bytes).unwrap();

        let err = load(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_negative_header_dimension_rejected() {
        // Valid magic and version but a negative max_seq_len must fail
        // as malformed input, not wrap into an enormous allocation
        let path = temp_path("negdim.bin");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&(-64i32).to_le_bytes()); // max_seq_len
        bytes.extend_from_slice(&16i32.to_le_bytes()); // vocab_size
        bytes.extend_from_slice(&1i32.to_le_bytes()); // num_layers
        bytes.extend_from_slice(&2i32.to_le_bytes()); // num_heads
        bytes.extend_from_slice(&8i32.to_le_bytes()); // channels
        bytes.extend_from_slice(&16i32.to_le_bytes()); // padded_vocab_size
        bytes.resize(HEADER_SLOTS * 4, 0);
        std::fs::write(&path, &bytes).unwrap();

        let err = load(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_file_rejected() {
        let path = temp_path("truncated.bin");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        // Plausible header but no parameter payload
        let config = Config::tiny(16);
        bytes.extend_from_slice(&(config.max_seq_len as i32).to_le_bytes());
        bytes.extend_from_slice(&(config.vocab_size as i32).to_le_bytes());
        bytes.extend_from_slice(&(config.num_layers as i32).to_le_bytes());
        bytes.extend_from_slice(&(config.num_heads as i32).to_le_bytes());
        bytes.extend_from_slice(&(config.channels as i32).to_le_bytes());
        bytes.extend_from_slice(&(config.padded_vocab_size as i32).to_le_bytes());
        bytes.resize(HEADER_SLOTS * 4, 0);
        std::fs::write(&path, &bytes).unwrap();

        let err = load(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
