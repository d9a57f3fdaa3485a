//! 存储快照格式（.svdx）
//!
//! 与原生文档格式相同的布局：16 字节文件头 + MessagePack + Zstd。
//! 命令行的 import/export 通过快照在多次调用之间共享同一个存储。

use crate::error::FileError;
use crate::store::MemoryStore;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// 文件魔数 "SVDX"
const MAGIC: &[u8; 4] = b"SVDX";

/// 当前快照格式版本
const FORMAT_VERSION: u32 = 1;

/// Zstd 压缩级别
const COMPRESSION_LEVEL: i32 = 3;

/// 文件头（16 字节）
#[derive(Debug)]
struct SnapshotHeader {
    magic: [u8; 4],
    version: u32,
    /// 预留
    flags: u32,
    compressed_size: u32,
}

impl SnapshotHeader {
    fn new(compressed_size: u32) -> Self {
        Self {
            magic: *MAGIC,
            version: FORMAT_VERSION,
            flags: 0,
            compressed_size,
        }
    }

    fn write(&self, writer: &mut impl Write) -> Result<(), std::io::Error> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        Ok(())
    }

    fn read(reader: &mut impl Read) -> Result<Self, FileError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(FileError::InvalidFormat(
                "Invalid magic number, not a SurveyCAD snapshot".to_string(),
            ));
        }

        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        let version = u32::from_le_bytes(buf);
        reader.read_exact(&mut buf)?;
        let flags = u32::from_le_bytes(buf);
        reader.read_exact(&mut buf)?;
        let compressed_size = u32::from_le_bytes(buf);

        Ok(Self {
            magic,
            version,
            flags,
            compressed_size,
        })
    }
}

/// 保存存储快照
pub fn save(store: &MemoryStore, path: &Path) -> Result<(), FileError> {
    let msgpack_data = rmp_serde::to_vec(store)?;
    let compressed_data = zstd::encode_all(msgpack_data.as_slice(), COMPRESSION_LEVEL)?;
    let compressed_size = u32::try_from(compressed_data.len()).map_err(|_| {
        FileError::InvalidFormat(format!(
            "snapshot too large ({} bytes compressed)",
            compressed_data.len()
        ))
    })?;

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    SnapshotHeader::new(compressed_size).write(&mut writer)?;
    writer.write_all(&compressed_data)?;
    writer.flush()?;

    tracing::info!(
        "Saved {} projects to {} ({} bytes compressed)",
        store.project_ids().count(),
        path.display(),
        compressed_data.len()
    );

    Ok(())
}

/// 加载存储快照
pub fn load(path: &Path) -> Result<MemoryStore, FileError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let header = SnapshotHeader::read(&mut reader)?;
    if header.version > FORMAT_VERSION {
        return Err(FileError::UnsupportedVersion(format!(
            "Snapshot version {} is newer than supported version {}",
            header.version, FORMAT_VERSION
        )));
    }

    let mut compressed_data = vec![0u8; header.compressed_size as usize];
    reader.read_exact(&mut compressed_data)?;
    let msgpack_data = zstd::decode_all(compressed_data.as_slice())?;
    let store: MemoryStore = rmp_serde::from_slice(&msgpack_data)?;

    tracing::info!(
        "Loaded {} projects from {}",
        store.project_ids().count(),
        path.display()
    );

    Ok(store)
}

/// 快照存在则加载，否则返回空存储
pub fn load_or_default(path: &Path) -> Result<MemoryStore, FileError> {
    if path.exists() {
        load(path)
    } else {
        tracing::debug!("Snapshot {} not found, starting empty", path.display());
        Ok(MemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GeometryStore;
    use surveycad_core::crs::CoordinateSystem;
    use surveycad_core::entity::CanonicalEntity;
    use surveycad_core::geometry::{Geometry, Polyline};
    use surveycad_core::math::Point3;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.svdx");

        let mut store = MemoryStore::new();
        let entity = CanonicalEntity::new(
            Geometry::Polyline(Polyline::from_points(
                [Point3::new(12.345, 67.89, 102.5), Point3::new(20.0, 70.0, 102.5)],
                false,
            )),
            "V-TOPO",
            CoordinateSystem::StatePlane(2226),
        )
        .unwrap();
        store.insert_entities("site", vec![entity.clone()]).unwrap();

        save(&store, &path).unwrap();

        let file = File::open(&path).unwrap();
        let header = SnapshotHeader::read(&mut BufReader::new(file)).unwrap();
        assert_eq!(&header.magic, MAGIC);
        assert_eq!(header.version, FORMAT_VERSION);

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.read_entities("site").unwrap(), vec![entity]);
    }

    #[test]
    fn test_invalid_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.svdx");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"ZCAD").unwrap();
        file.write_all(&[0u8; 12]).unwrap();

        assert!(matches!(load(&path), Err(FileError::InvalidFormat(_))));
    }

    #[test]
    fn test_missing_snapshot_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = load_or_default(&dir.path().join("absent.svdx")).unwrap();
        assert_eq!(store.project_ids().count(), 0);
    }
}
