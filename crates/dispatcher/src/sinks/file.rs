//! FileSink - writes envelopes to disk, one file per message
//!
//! Layout: `<base_path>/<topic>/<seq>.<ext>`
//! - `rgb8` / `mono8` images: PNG
//! - `32FC1` images: raw little-endian floats (`.bin`)
//! - point clouds: binary PLY
//! - everything else: JSON

use contracts::{BusMessage, ContractError, DataSink, Envelope, ImageEncoding, ImageMsg, PointCloudMsg};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

impl FileSinkConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        Self { base_path }
    }
}

/// Sink that writes envelopes to disk files
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    created_dirs: HashSet<PathBuf>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            created_dirs: HashSet::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    /// Directory for a topic; empty, `.` and `..` segments are dropped
    fn topic_dir(&self, topic: &str) -> PathBuf {
        topic
            .split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .fold(self.config.base_path.clone(), |dir, segment| dir.join(segment))
    }

    fn ensure_dir(&mut self, dir: &Path) -> std::io::Result<()> {
        if !self.created_dirs.contains(dir) {
            fs::create_dir_all(dir)?;
            self.created_dirs.insert(dir.to_path_buf());
        }
        Ok(())
    }

    fn write_envelope_to_disk(&mut self, envelope: &Envelope) -> std::io::Result<PathBuf> {
        let dir = self.topic_dir(&envelope.topic);
        self.ensure_dir(&dir)?;
        let seq = envelope.seq;

        let path = match &envelope.message {
            BusMessage::Image(image) => match image.encoding {
                ImageEncoding::Rgb8 | ImageEncoding::Mono8 => {
                    let path = dir.join(format!("{seq}.png"));
                    save_png(&path, image)?;
                    path
                }
                ImageEncoding::Float32C1 => {
                    let path = dir.join(format!("{seq}.bin"));
                    fs::write(&path, &image.data)?;
                    path
                }
            },
            BusMessage::PointCloud(cloud) => {
                let path = dir.join(format!("{seq}.ply"));
                save_ply(&path, cloud)?;
                path
            }
            other => {
                let path = dir.join(format!("{seq}.json"));
                let file = BufWriter::new(File::create(&path)?);
                serde_json::to_writer(file, other)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                path
            }
        };
        Ok(path)
    }

    fn persist(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        match self.write_envelope_to_disk(envelope) {
            Ok(path) => {
                debug!(sink = %self.name, path = %path.display(), "written");
                Ok(())
            }
            Err(e) => {
                error!(sink = %self.name, topic = %envelope.topic, seq = envelope.seq, error = %e, "Write failed");
                Err(ContractError::sink_write(&self.name, e.to_string()))
            }
        }
    }
}

fn save_png(path: &Path, image: &ImageMsg) -> std::io::Result<()> {
    let color = match image.encoding {
        ImageEncoding::Mono8 => image::ColorType::L8,
        _ => image::ColorType::Rgb8,
    };
    let bpp = image.encoding.bytes_per_pixel() as usize;
    let row = image.width as usize * bpp;
    let step = image.step as usize;
    let expected = step * image.height as usize;
    if step < row || image.data.len() != expected {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "{}x{} {} image: {} bytes with step {step}, expected {expected}",
                image.width,
                image.height,
                image.encoding.as_str(),
                image.data.len()
            ),
        ));
    }

    // rows may be padded past width * bpp
    let packed;
    let data: &[u8] = if step == row {
        &image.data
    } else {
        packed = image
            .data
            .chunks(step)
            .take(image.height as usize)
            .flat_map(|r| r.iter().take(row).copied())
            .collect::<Vec<u8>>();
        &packed
    };

    image::save_buffer(path, data, image.width, image.height, color).map_err(std::io::Error::other)
}

fn save_ply(path: &Path, cloud: &PointCloudMsg) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "ply")?;
    writeln!(file, "format binary_little_endian 1.0")?;
    writeln!(file, "element vertex {}", cloud.num_points())?;
    for field in &cloud.fields {
        writeln!(file, "property float {}", field.name)?;
    }
    writeln!(file, "end_header")?;
    file.write_all(&cloud.data)?;
    file.flush()
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, envelope),
        fields(sink = %self.name, topic = %envelope.topic, seq = envelope.seq)
    )]
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        self.persist(envelope)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{Header, ImuMsg, Stamp};
    use tempfile::tempdir;

    fn sink_in(dir: &Path) -> FileSink {
        FileSink::new(
            "test_file",
            FileSinkConfig {
                base_path: dir.to_path_buf(),
            },
        )
        .unwrap()
    }

    fn image(encoding: ImageEncoding, data: Vec<u8>, step: u32) -> BusMessage {
        BusMessage::Image(ImageMsg {
            header: Header::new(Stamp::default(), "base_camera"),
            height: 2,
            width: 2,
            encoding,
            is_bigendian: false,
            step,
            data: Bytes::from(data),
        })
    }

    #[tokio::test]
    async fn test_rgb_image_written_as_png() {
        let dir = tempdir().unwrap();
        let mut sink = sink_in(dir.path());
        let envelope = Envelope {
            topic: "airsim/rgb/image".into(),
            seq: 7,
            message: image(ImageEncoding::Rgb8, vec![10; 12], 6),
        };

        sink.write(&envelope).await.unwrap();

        let path = dir.path().join("airsim/rgb/image/7.png");
        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (2, 2));
    }

    #[tokio::test]
    async fn test_short_image_buffer_is_write_error() {
        let dir = tempdir().unwrap();
        let mut sink = sink_in(dir.path());
        let empty = Envelope {
            topic: "airsim/rgb/image".into(),
            seq: 1,
            message: image(ImageEncoding::Rgb8, Vec::new(), 6),
        };
        let narrow_step = Envelope {
            topic: "airsim/rgb/image".into(),
            seq: 2,
            message: image(ImageEncoding::Mono8, vec![1; 2], 1),
        };

        let err = sink.write(&empty).await.unwrap_err();
        assert!(matches!(err, ContractError::SinkWrite { .. }));
        assert!(err.to_string().contains("expected 12"));
        assert!(sink.write(&narrow_step).await.is_err());

        // the sink keeps working afterwards
        let good = Envelope {
            topic: "airsim/rgb/image".into(),
            seq: 3,
            message: image(ImageEncoding::Rgb8, vec![10; 12], 6),
        };
        sink.write(&good).await.unwrap();
        assert!(dir.path().join("airsim/rgb/image/3.png").exists());
    }

    #[tokio::test]
    async fn test_depth_written_raw() {
        let dir = tempdir().unwrap();
        let mut sink = sink_in(dir.path());
        let data: Vec<u8> = [1.5f32, 2.0, 2.5, 3.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let envelope = Envelope {
            topic: "airsim/depth/image".into(),
            seq: 1,
            message: image(ImageEncoding::Float32C1, data.clone(), 8),
        };

        sink.write(&envelope).await.unwrap();
        let written = fs::read(dir.path().join("airsim/depth/image/1.bin")).unwrap();
        assert_eq!(written, data);
    }

    #[tokio::test]
    async fn test_point_cloud_written_as_ply() {
        let dir = tempdir().unwrap();
        let mut sink = sink_in(dir.path());
        let header = Header::new(Stamp::default(), "base_laser");
        let envelope = Envelope {
            topic: "airsim/lidar".into(),
            seq: 3,
            message: BusMessage::PointCloud(PointCloudMsg::xyz32(
                header,
                &[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            )),
        };

        sink.write(&envelope).await.unwrap();
        let written = fs::read(dir.path().join("airsim/lidar/3.ply")).unwrap();
        let text = String::from_utf8_lossy(&written);
        assert!(text.contains("element vertex 2"));
        assert!(text.contains("property float z"));
        assert!(written.ends_with(&6.0f32.to_le_bytes()));
    }

    #[tokio::test]
    async fn test_other_messages_written_as_json() {
        let dir = tempdir().unwrap();
        let mut sink = sink_in(dir.path());
        let envelope = Envelope {
            topic: "airsim/imu".into(),
            seq: 2,
            message: BusMessage::Imu(ImuMsg {
                header: Header::new(Stamp::default(), "base_link"),
                orientation: Default::default(),
                angular_velocity: Default::default(),
                linear_acceleration: Default::default(),
            }),
        };

        sink.write(&envelope).await.unwrap();
        let json = fs::read_to_string(dir.path().join("airsim/imu/2.json")).unwrap();
        assert!(json.contains("\"kind\":\"imu\""));
    }

    #[test]
    fn test_topic_dir_stays_under_base() {
        let dir = tempdir().unwrap();
        let sink = sink_in(dir.path());
        assert_eq!(sink.topic_dir("/../tf"), dir.path().join("tf"));
    }
}
