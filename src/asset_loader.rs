use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
};

use anyhow::Context;
use tokio::io::AsyncReadExt;

const READ_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: u64,
}

impl LoadProgress {
    /// Rounded percentage, or `None` while the total size is unknown.
    pub fn percent(&self) -> Option<u32> {
        if self.total == 0 {
            return None;
        }
        Some((self.loaded as f64 / self.total as f64 * 100.0).round() as u32)
    }
}

pub struct GltfAsset {
    pub path: PathBuf,
    pub document: gltf::Document,
    pub buffers: Vec<gltf::buffer::Data>,
    pub images: Vec<gltf::image::Data>,
}

pub enum LoadEvent {
    Progress(LoadProgress),
    Loaded(Box<GltfAsset>),
    Failed(anyhow::Error),
}

/// Streams assets from disk on a small tokio runtime. Results come back over
/// a channel that the frame loop drains without blocking.
pub struct AssetLoader {
    runtime: tokio::runtime::Runtime,
}

impl AssetLoader {
    pub fn new() -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("asset-loader")
            .enable_all()
            .build()
            .context("Failed to create asset loader runtime")?;

        Ok(Self { runtime })
    }

    pub fn load_gltf(&self, path: impl Into<PathBuf>) -> PendingLoad {
        let path = path.into();
        let (sender, receiver) = mpsc::channel();

        self.runtime.spawn(async move {
            let event = match fetch_gltf(&path, &sender).await {
                Ok(asset) => LoadEvent::Loaded(Box::new(asset)),
                Err(error) => LoadEvent::Failed(error),
            };
            // The receiver is gone if the app shut down mid-load.
            let _ = sender.send(event);
        });

        PendingLoad::new(receiver)
    }
}

async fn fetch_gltf(path: &Path, progress: &Sender<LoadEvent>) -> anyhow::Result<GltfAsset> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open model {}", path.display()))?;

    let total = file
        .metadata()
        .await
        .with_context(|| format!("Failed to stat model {}", path.display()))?
        .len();

    let mut bytes = Vec::with_capacity(total as usize);
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let read = file
            .read(&mut chunk)
            .await
            .with_context(|| format!("Failed to read model {}", path.display()))?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);

        let _ = progress.send(LoadEvent::Progress(LoadProgress {
            loaded: bytes.len() as u64,
            total,
        }));
    }

    let base = path.parent().map(Path::to_path_buf);
    let (document, buffers, images) =
        tokio::task::spawn_blocking(move || parse_gltf(&bytes, base.as_deref()))
            .await
            .context("glTF parser task failed")?
            .with_context(|| format!("Failed to parse model {}", path.display()))?;

    Ok(GltfAsset {
        path: path.to_path_buf(),
        document,
        buffers,
        images,
    })
}

type ParsedGltf = (
    gltf::Document,
    Vec<gltf::buffer::Data>,
    Vec<gltf::image::Data>,
);

/// Parses a glTF or GLB, resolving external buffers and images relative to
/// `base`.
fn parse_gltf(bytes: &[u8], base: Option<&Path>) -> gltf::Result<ParsedGltf> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)?;
    let buffers = gltf::import_buffers(&document, base, blob)?;
    let images = gltf::import_images(&document, base, &buffers)?;
    Ok((document, buffers, images))
}

/// The receiving end of a single-shot load.
pub struct PendingLoad {
    receiver: Receiver<LoadEvent>,
    finished: bool,
}

impl PendingLoad {
    pub fn new(receiver: Receiver<LoadEvent>) -> Self {
        Self {
            receiver,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the next queued event without blocking. A loader that vanishes
    /// without reporting an outcome is reported as a failure.
    pub fn try_next(&mut self) -> Option<LoadEvent> {
        if self.finished {
            return None;
        }

        match self.receiver.try_recv() {
            Ok(event) => {
                if !matches!(event, LoadEvent::Progress(_)) {
                    self.finished = true;
                }
                Some(event)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.finished = true;
                Some(LoadEvent::Failed(anyhow::anyhow!(
                    "Asset loader stopped before finishing"
                )))
            }
        }
    }
}

/// A single triangle with an embedded buffer and no normals.
#[cfg(test)]
pub(crate) const TRIANGLE_GLTF: &str = r#"{
    "asset": { "version": "2.0" },
    "scene": 0,
    "scenes": [{ "nodes": [0] }],
    "nodes": [{ "name": "Shoe", "mesh": 0 }],
    "meshes": [{ "name": "Upper", "primitives": [{ "attributes": { "POSITION": 0 } }] }],
    "buffers": [{
        "byteLength": 36,
        "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
    }],
    "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
    "accessors": [{
        "bufferView": 0,
        "componentType": 5126,
        "count": 3,
        "type": "VEC3",
        "min": [0.0, 0.0, 0.0],
        "max": [1.0, 1.0, 0.0]
    }]
}"#;

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn collect_until_finished(mut pending: PendingLoad) -> Vec<LoadEvent> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        while !pending.is_finished() {
            assert!(Instant::now() < deadline, "load did not finish in time");
            match pending.try_next() {
                Some(event) => events.push(event),
                None => std::thread::sleep(Duration::from_millis(5)),
            }
        }
        events
    }

    #[test]
    fn percent_rounds_like_the_loader_text() {
        let half = LoadProgress {
            loaded: 50,
            total: 100,
        };
        assert_eq!(half.percent(), Some(50));
        assert_eq!(
            LoadProgress {
                loaded: 2,
                total: 3
            }
            .percent(),
            Some(67)
        );
        assert_eq!(
            LoadProgress {
                loaded: 10,
                total: 0
            }
            .percent(),
            None
        );
    }

    #[test]
    fn missing_file_reports_failure() {
        let loader = AssetLoader::new().unwrap();
        let events = collect_until_finished(loader.load_gltf("does/not/exist.glb"));

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], LoadEvent::Failed(_)));
    }

    #[test]
    fn loads_gltf_with_progress() {
        let path = std::env::temp_dir().join(format!(
            "showcase-loader-test-{}.gltf",
            std::process::id()
        ));
        std::fs::write(&path, TRIANGLE_GLTF).unwrap();

        let loader = AssetLoader::new().unwrap();
        let events = collect_until_finished(loader.load_gltf(&path));
        std::fs::remove_file(&path).unwrap();

        let (last, progress) = events.split_last().unwrap();
        assert!(!progress.is_empty());
        for event in progress {
            assert!(matches!(event, LoadEvent::Progress(_)));
        }
        let LoadEvent::Progress(final_progress) = progress.last().unwrap() else {
            unreachable!()
        };
        assert_eq!(final_progress.percent(), Some(100));

        let LoadEvent::Loaded(asset) = last else {
            panic!("expected a loaded asset");
        };
        assert_eq!(asset.document.meshes().count(), 1);
        assert_eq!(asset.buffers[0].len(), 36);
    }

    #[test]
    fn external_buffers_resolve_next_to_the_model() {
        let dir = std::env::temp_dir().join(format!("showcase-external-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let bin: Vec<u8> = positions.iter().flat_map(|v| v.to_le_bytes()).collect();
        std::fs::write(dir.join("shoe.bin"), &bin).unwrap();

        let external = TRIANGLE_GLTF.replace(
            "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA",
            "shoe.bin",
        );
        let model_path = dir.join("shoe.gltf");
        std::fs::write(&model_path, external).unwrap();

        let loader = AssetLoader::new().unwrap();
        let events = collect_until_finished(loader.load_gltf(&model_path));
        std::fs::remove_dir_all(&dir).unwrap();

        let Some(LoadEvent::Loaded(asset)) = events.last() else {
            panic!("expected a loaded asset");
        };
        assert_eq!(&asset.buffers[0][..], &bin[..]);
    }

    #[test]
    fn dropped_sender_is_a_failure() {
        let (sender, receiver) = mpsc::channel();
        sender
            .send(LoadEvent::Progress(LoadProgress {
                loaded: 1,
                total: 2,
            }))
            .unwrap();
        drop(sender);

        let mut pending = PendingLoad::new(receiver);
        assert!(matches!(pending.try_next(), Some(LoadEvent::Progress(_))));
        assert!(matches!(pending.try_next(), Some(LoadEvent::Failed(_))));
        assert!(pending.try_next().is_none());
    }
}
