//! CIFAR-10 records, splits and batching.
//!
//! Records are read from the binary distribution of CIFAR-10
//! (`cifar-10-batches-bin`) and kept fully resident in memory; the whole
//! dataset is about 180 MB. Following Burn's convention, datasets hand out raw
//! data and the batcher is the only place where tensors are created.

use std::{fmt, fs, marker::PhantomData, path::Path, sync::Arc};

use burn::{
    data::{
        dataloader::batcher::Batcher,
        dataset::{Dataset, InMemDataset},
    },
    tensor::{backend::Backend, Int, Tensor, TensorData},
};

use crate::{
    config::InputConfig,
    error::{Cifar10Error, Cifar10Result},
    IMAGE_SIZE, NUM_CHANNELS, NUM_CLASSES, SOURCE_IMAGE_SIZE,
};

/// Bytes per record in the binary files: one label byte followed by the pixels.
const RECORD_BYTES: usize = 1 + SOURCE_IMAGE_SIZE * SOURCE_IMAGE_SIZE * NUM_CHANNELS;

const TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const TEST_FILES: [&str; 1] = ["test_batch.bin"];

/// Selects the data partition a pipeline reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    /// Maps the `eval_data` argument of [`crate::inputs`] to a split.
    ///
    /// Only the exact string `"test"` selects the test partition; anything
    /// else reads the training partition.
    pub fn from_eval_data(eval_data: &str) -> Self {
        if eval_data == "test" {
            Self::Test
        } else {
            Self::Train
        }
    }

    fn file_names(self) -> &'static [&'static str] {
        match self {
            Self::Train => &TRAIN_FILES,
            Self::Test => &TEST_FILES,
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => f.write_str("train"),
            Self::Test => f.write_str("test"),
        }
    }
}

/// One labeled image as provided by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cifar10Record {
    /// Raw pixel intensities in HWC order with 3 channels.
    pub image: Vec<u8>,
    /// Image height in pixels
    pub height: usize,
    /// Image width in pixels
    pub width: usize,
    /// Class id in `0..NUM_CLASSES`.
    pub label: u8,
}

impl Cifar10Record {
    /// Create a record, checking that the pixel buffer matches the shape.
    pub fn new(image: Vec<u8>, height: usize, width: usize, label: u8) -> Cifar10Result<Self> {
        let expected = height * width * NUM_CHANNELS;
        if image.len() != expected {
            return Err(Cifar10Error::InvalidImageShape {
                expected: format!("{height}x{width}x{NUM_CHANNELS} ({expected} values)"),
                actual: format!("{} values", image.len()),
            });
        }
        Ok(Self {
            image,
            height,
            width,
            label,
        })
    }

    /// Decode one record of the binary format.
    ///
    /// The file stores pixels channel-planar (all red, all green, all blue);
    /// they are reordered to HWC here.
    fn decode(bytes: &[u8], index: usize) -> Cifar10Result<Self> {
        let label = bytes[0];
        if usize::from(label) >= NUM_CLASSES {
            return Err(Cifar10Error::InvalidLabel { label, index });
        }

        let plane = SOURCE_IMAGE_SIZE * SOURCE_IMAGE_SIZE;
        let pixels = &bytes[1..];
        let mut image = vec![0u8; plane * NUM_CHANNELS];
        for (offset, hwc) in image.chunks_exact_mut(NUM_CHANNELS).enumerate() {
            for (channel, value) in hwc.iter_mut().enumerate() {
                *value = pixels[channel * plane + offset];
            }
        }

        Ok(Self {
            image,
            height: SOURCE_IMAGE_SIZE,
            width: SOURCE_IMAGE_SIZE,
            label,
        })
    }
}

/// One split of CIFAR-10 held in memory.
pub struct Cifar10Dataset {
    split: Split,
    records: InMemDataset<Cifar10Record>,
}

impl Cifar10Dataset {
    /// Load a split from the directory holding the `*.bin` batch files.
    pub fn load(dir: impl AsRef<Path>, split: Split) -> Cifar10Result<Self> {
        let dir = dir.as_ref();
        let mut records = Vec::new();
        for name in split.file_names() {
            let path = dir.join(name);
            let parsed = read_batch_file(&path, records.len())?;
            tracing::debug!(path = %path.display(), records = parsed.len(), "read batch file");
            records.extend(parsed);
        }

        tracing::info!(%split, records = records.len(), dir = %dir.display(), "loaded CIFAR-10 split");
        Ok(Self::from_records(split, records))
    }

    /// Wrap records produced elsewhere as a split.
    pub fn from_records(split: Split, records: Vec<Cifar10Record>) -> Self {
        Self {
            split,
            records: InMemDataset::new(records),
        }
    }

    pub fn split(&self) -> Split {
        self.split
    }
}

impl Dataset<Cifar10Record> for Cifar10Dataset {
    fn get(&self, index: usize) -> Option<Cifar10Record> {
        self.records.get(index)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Parse one binary batch file. `first_index` numbers records within the split.
fn read_batch_file(path: &Path, first_index: usize) -> Cifar10Result<Vec<Cifar10Record>> {
    let bytes = fs::read(path).map_err(|source| Cifar10Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.len() % RECORD_BYTES != 0 {
        return Err(Cifar10Error::MalformedFile {
            path: path.to_path_buf(),
            len: bytes.len(),
        });
    }

    bytes
        .chunks_exact(RECORD_BYTES)
        .enumerate()
        .map(|(i, chunk)| Cifar10Record::decode(chunk, first_index + i))
        .collect()
}

/// Both CIFAR-10 partitions, shared read-only with the pipelines built on them.
#[derive(Clone)]
pub struct Cifar10Source {
    train: Arc<Cifar10Dataset>,
    test: Arc<Cifar10Dataset>,
}

impl Cifar10Source {
    /// Load both splits from a `cifar-10-batches-bin` directory.
    pub fn load(dir: impl AsRef<Path>) -> Cifar10Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            train: Arc::new(Cifar10Dataset::load(dir, Split::Train)?),
            test: Arc::new(Cifar10Dataset::load(dir, Split::Test)?),
        })
    }

    /// Load both splits from `config.data_dir`.
    pub fn from_config(config: &InputConfig) -> Cifar10Result<Self> {
        Self::load(&config.data_dir)
    }

    pub fn from_records(train: Vec<Cifar10Record>, test: Vec<Cifar10Record>) -> Self {
        Self {
            train: Arc::new(Cifar10Dataset::from_records(Split::Train, train)),
            test: Arc::new(Cifar10Dataset::from_records(Split::Test, test)),
        }
    }

    pub fn split(&self, split: Split) -> Arc<Cifar10Dataset> {
        match split {
            Split::Train => Arc::clone(&self.train),
            Split::Test => Arc::clone(&self.test),
        }
    }
}

/// A preprocessed record ready for batching.
#[derive(Debug, Clone, PartialEq)]
pub struct Cifar10Item {
    /// Standardized image, `IMAGE_SIZE x IMAGE_SIZE x 3` in HWC order.
    pub input: Vec<f32>,
    /// The record's label, unchanged.
    pub target: u8,
}

/// A batch of preprocessed records.
#[derive(Debug, Clone)]
pub struct Cifar10Batch<B: Backend> {
    /// Images with shape `[batch_size, IMAGE_SIZE, IMAGE_SIZE, 3]`.
    pub images: Tensor<B, 4>,
    /// Labels with shape `[batch_size]`.
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> Cifar10Batch<B> {
    /// Split the batch into its `(images, labels)` tensors.
    pub fn into_parts(self) -> (Tensor<B, 4>, Tensor<B, 1, Int>) {
        (self.images, self.labels)
    }
}

/// Stacks [`Cifar10Item`]s into a [`Cifar10Batch`] on the target device.
#[derive(Clone, Default)]
pub struct Cifar10Batcher<B: Backend> {
    _phantom: PhantomData<B>,
}

impl<B: Backend> Cifar10Batcher<B> {
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, Cifar10Item, Cifar10Batch<B>> for Cifar10Batcher<B> {
    fn batch(&self, items: Vec<Cifar10Item>, device: &B::Device) -> Cifar10Batch<B> {
        let batch_size = items.len();
        let image_len = IMAGE_SIZE * IMAGE_SIZE * NUM_CHANNELS;

        let mut images = Vec::with_capacity(batch_size * image_len);
        let mut labels = Vec::with_capacity(batch_size);
        for item in items {
            images.extend(item.input);
            labels.push(i64::from(item.target));
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(images, [batch_size, IMAGE_SIZE, IMAGE_SIZE, NUM_CHANNELS]),
            device,
        );
        let labels = Tensor::<B, 1, Int>::from_data(TensorData::new(labels, [batch_size]), device);

        Cifar10Batch { images, labels }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    use super::*;

    type TestBackend = NdArray;

    fn binary_record(label: u8, red: u8, green: u8, blue: u8) -> Vec<u8> {
        let plane = SOURCE_IMAGE_SIZE * SOURCE_IMAGE_SIZE;
        let mut bytes = vec![label];
        bytes.extend(std::iter::repeat_n(red, plane));
        bytes.extend(std::iter::repeat_n(green, plane));
        bytes.extend(std::iter::repeat_n(blue, plane));
        bytes
    }

    fn write_file(dir: &Path, name: &str, records: &[Vec<u8>]) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        for record in records {
            file.write_all(record).unwrap();
        }
    }

    #[test]
    fn eval_data_selects_split() {
        assert_eq!(Split::from_eval_data("test"), Split::Test);
        assert_eq!(Split::from_eval_data("train"), Split::Train);
        assert_eq!(Split::from_eval_data("Test"), Split::Train);
        assert_eq!(Split::from_eval_data(""), Split::Train);
    }

    #[test]
    fn decode_reorders_planes_to_hwc() {
        let plane = SOURCE_IMAGE_SIZE * SOURCE_IMAGE_SIZE;
        let mut bytes = vec![4u8];
        // Red plane counts up, green is constant, blue counts down.
        bytes.extend((0..plane).map(|i| (i % 256) as u8));
        bytes.extend(std::iter::repeat_n(7u8, plane));
        bytes.extend((0..plane).map(|i| 255 - (i % 256) as u8));

        let record = Cifar10Record::decode(&bytes, 0).unwrap();
        assert_eq!(record.label, 4);
        assert_eq!((record.height, record.width), (32, 32));

        // Pixel (row 1, col 2) sits at plane offset 34.
        let offset = (SOURCE_IMAGE_SIZE + 2) * NUM_CHANNELS;
        assert_eq!(&record.image[offset..offset + 3], &[34, 7, 221]);
    }

    #[test]
    fn load_reads_every_train_file_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in TRAIN_FILES.iter().enumerate() {
            let label = i as u8;
            write_file(
                dir.path(),
                name,
                &[binary_record(label, 1, 2, 3), binary_record(label, 4, 5, 6)],
            );
        }

        let dataset = Cifar10Dataset::load(dir.path(), Split::Train).unwrap();
        assert_eq!(dataset.split(), Split::Train);
        assert_eq!(dataset.len(), 10);
        let labels: Vec<u8> = dataset.iter().map(|record| record.label).collect();
        assert_eq!(labels, vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
        assert_eq!(&dataset.get(1).unwrap().image[..3], &[4, 5, 6]);
    }

    #[test]
    fn source_keeps_partitions_apart() {
        let dir = tempfile::tempdir().unwrap();
        for name in TRAIN_FILES {
            write_file(dir.path(), name, &[binary_record(1, 0, 0, 0)]);
        }
        write_file(dir.path(), "test_batch.bin", &[binary_record(9, 0, 0, 0)]);

        let source = Cifar10Source::load(dir.path()).unwrap();
        assert_eq!(source.split(Split::Train).len(), 5);
        assert_eq!(source.split(Split::Test).len(), 1);
        assert_eq!(source.split(Split::Test).get(0).unwrap().label, 9);

        let config = InputConfig::new().with_data_dir(dir.path().to_path_buf());
        let reloaded = Cifar10Source::from_config(&config).unwrap();
        assert_eq!(reloaded.split(Split::Train).split(), Split::Train);
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        match Cifar10Dataset::load(dir.path(), Split::Test) {
            Err(Cifar10Error::FileRead { path, .. }) => {
                assert!(path.ends_with("test_batch.bin"));
            }
            other => panic!("Expected FileRead error, got {:?}", other.err()),
        }
    }

    #[test]
    fn truncated_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = binary_record(0, 0, 0, 0);
        record.pop();
        write_file(dir.path(), "test_batch.bin", &[record]);

        match Cifar10Dataset::load(dir.path(), Split::Test) {
            Err(Cifar10Error::MalformedFile { len, .. }) => assert_eq!(len, RECORD_BYTES - 1),
            other => panic!("Expected MalformedFile error, got {:?}", other.err()),
        }
    }

    #[test]
    fn out_of_range_label_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "test_batch.bin",
            &[binary_record(3, 0, 0, 0), binary_record(10, 0, 0, 0)],
        );

        match Cifar10Dataset::load(dir.path(), Split::Test) {
            Err(Cifar10Error::InvalidLabel { label, index }) => {
                assert_eq!(label, 10);
                assert_eq!(index, 1);
            }
            other => panic!("Expected InvalidLabel error, got {:?}", other.err()),
        }
    }

    #[test]
    fn record_shape_is_checked() {
        assert!(Cifar10Record::new(vec![0; 2 * 3 * 3], 2, 3, 0).is_ok());
        assert!(matches!(
            Cifar10Record::new(vec![0; 5], 2, 3, 0),
            Err(Cifar10Error::InvalidImageShape { .. })
        ));
    }

    #[test]
    fn batcher_stacks_items() {
        let device = NdArrayDevice::Cpu;
        let batcher = Cifar10Batcher::<TestBackend>::new();
        let image_len = IMAGE_SIZE * IMAGE_SIZE * NUM_CHANNELS;

        let items = vec![
            Cifar10Item {
                input: vec![0.5; image_len],
                target: 3,
            },
            Cifar10Item {
                input: vec![-1.0; image_len],
                target: 8,
            },
        ];
        let (images, labels) = batcher.batch(items, &device).into_parts();

        assert_eq!(images.dims(), [2, IMAGE_SIZE, IMAGE_SIZE, NUM_CHANNELS]);
        assert_eq!(labels.dims(), [2]);

        let labels = labels.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![3, 8]);

        let values = images.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values[0], 0.5);
        assert_eq!(values[image_len], -1.0);
    }
}
