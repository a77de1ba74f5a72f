//! The endless batched input stream.
//!
//! A background producer thread walks the split forever, preprocesses records
//! on a rayon pool and pushes them into a bounded channel. The consumer side
//! ([`InputPipeline`]) pulls `batch_size` records at a time and stacks them
//! into tensors on the caller's device. Batches freely span the boundary
//! between two passes over the split.

use std::{
    sync::{
        mpsc::{self, Receiver, SyncSender},
        Arc,
    },
    thread,
};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::backend::Backend,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rayon::prelude::*;

use crate::{
    config::InputConfig,
    dataset::{Cifar10Batch, Cifar10Batcher, Cifar10Dataset, Cifar10Item, Cifar10Record},
    error::{Cifar10Error, Cifar10Result},
    preprocessing::DataPreprocessor,
    summary::ImageSummary,
    Split,
};

/// Cycles over `0..len` forever, optionally reshuffling before every pass.
pub(crate) struct RepeatSampler {
    order: Vec<usize>,
    cursor: usize,
    pass: usize,
    shuffle: bool,
    rng: StdRng,
}

impl RepeatSampler {
    pub(crate) fn new(len: usize, shuffle: bool, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..len).collect();
        if shuffle {
            order.shuffle(&mut rng);
        }
        Self {
            order,
            cursor: 0,
            pass: 0,
            shuffle,
            rng,
        }
    }

    /// Next index of the stream. `len` must be non-zero.
    pub(crate) fn next_index(&mut self) -> usize {
        if self.cursor == self.order.len() {
            self.cursor = 0;
            self.pass += 1;
            if self.shuffle {
                self.order.shuffle(&mut self.rng);
            }
            tracing::debug!(pass = self.pass, records = self.order.len(), "starting new pass over split");
        }
        let index = self.order[self.cursor];
        self.cursor += 1;
        index
    }
}

/// Background half of the pipeline.
struct Producer<D> {
    dataset: Arc<D>,
    preprocessor: DataPreprocessor,
    sampler: RepeatSampler,
    pool: rayon::ThreadPool,
    chunk_size: usize,
    seed: u64,
    position: u64,
}

impl<D: Dataset<Cifar10Record>> Producer<D> {
    fn run(mut self, sender: SyncSender<Cifar10Result<Cifar10Item>>) {
        loop {
            let chunk: Vec<(u64, usize)> = (0..self.chunk_size)
                .map(|_| {
                    let position = self.position;
                    self.position += 1;
                    (position, self.sampler.next_index())
                })
                .collect();

            let dataset = &self.dataset;
            let preprocessor = self.preprocessor;
            let seed = self.seed;
            let items: Vec<_> = self.pool.install(|| {
                chunk
                    .par_iter()
                    .map(|&(position, index)| {
                        process_one(dataset.as_ref(), preprocessor, seed, position, index)
                    })
                    .collect()
            });

            for item in items {
                if sender.send(item).is_err() {
                    tracing::debug!(position = self.position, "input pipeline dropped, stopping producer");
                    return;
                }
            }
        }
    }
}

/// Preprocess the record at `index` with an RNG derived from its stream position,
/// so the output does not depend on which worker picks it up.
fn process_one<D: Dataset<Cifar10Record>>(
    dataset: &D,
    preprocessor: DataPreprocessor,
    seed: u64,
    position: u64,
    index: usize,
) -> Cifar10Result<Cifar10Item> {
    let record = dataset
        .get(index)
        .ok_or(Cifar10Error::MissingRecord { index })?;
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(position.wrapping_add(1)));
    preprocessor.process(&record, &mut rng)
}

/// An endless stream of [`Cifar10Batch`]es.
///
/// Each pull blocks until `batch_size` preprocessed records are available.
/// Errors from the source or from preprocessing are returned by the pull that
/// reaches them; the stream itself never ends. Dropping the pipeline stops the
/// producer thread.
pub struct InputPipeline<B: Backend> {
    receiver: Receiver<Cifar10Result<Cifar10Item>>,
    batcher: Cifar10Batcher<B>,
    batch_size: usize,
    device: B::Device,
    summary: ImageSummary,
}

impl<B: Backend> InputPipeline<B> {
    /// Build a pipeline over one CIFAR-10 split.
    ///
    /// Shuffling (when enabled in `config`) applies to the training split only;
    /// the test split is always read in source order.
    pub fn new(
        dataset: Arc<Cifar10Dataset>,
        preprocessor: DataPreprocessor,
        batch_size: usize,
        config: &InputConfig,
        device: &B::Device,
    ) -> Cifar10Result<Self> {
        let split = dataset.split();
        let shuffle = config.shuffle && split == Split::Train;
        if dataset.is_empty() {
            return Err(Cifar10Error::EmptyDataset {
                split: split.to_string(),
            });
        }
        tracing::info!(
            %split,
            batch_size,
            distords = preprocessor.distords(),
            shuffle,
            records = dataset.len(),
            "building CIFAR-10 input pipeline"
        );
        Self::from_dataset(dataset, shuffle, preprocessor, batch_size, config, device)
    }

    /// Build a pipeline over any in-memory record dataset.
    pub fn from_dataset<D>(
        dataset: Arc<D>,
        shuffle: bool,
        preprocessor: DataPreprocessor,
        batch_size: usize,
        config: &InputConfig,
        device: &B::Device,
    ) -> Cifar10Result<Self>
    where
        D: Dataset<Cifar10Record> + 'static,
    {
        if batch_size == 0 {
            return Err(Cifar10Error::InvalidBatchSize { batch_size });
        }
        if dataset.is_empty() {
            return Err(Cifar10Error::EmptyDataset {
                split: "custom".to_string(),
            });
        }

        let seed = config.seed.unwrap_or_else(rand::random);
        let workers = config.num_parallel_calls.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("cifar10-preprocess-{i}"))
            .build()?;

        let producer = Producer {
            sampler: RepeatSampler::new(dataset.len(), shuffle, seed),
            dataset,
            preprocessor,
            pool,
            chunk_size: batch_size.max(workers),
            seed,
            position: 0,
        };

        let (sender, receiver) = mpsc::sync_channel(config.prefetch_records(batch_size));
        thread::Builder::new()
            .name("cifar10-producer".to_string())
            .spawn(move || producer.run(sender))
            .map_err(|source| Cifar10Error::ThreadSpawn { source })?;

        Ok(Self {
            receiver,
            batcher: Cifar10Batcher::new(),
            batch_size,
            device: device.clone(),
            summary: ImageSummary::from_config(config),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Pull the next batch, blocking until it is complete.
    pub fn next_batch(&mut self) -> Cifar10Result<Cifar10Batch<B>> {
        let mut items = Vec::with_capacity(self.batch_size);
        while items.len() < self.batch_size {
            let item = self
                .receiver
                .recv()
                .map_err(|_| Cifar10Error::PipelineClosed)??;
            items.push(item);
        }

        if let Err(e) = self.summary.record(&items) {
            tracing::warn!(error = %e, "failed to write image summary");
        }

        Ok(self.batcher.batch(items, &self.device))
    }
}

impl<B: Backend> Iterator for InputPipeline<B> {
    type Item = Cifar10Result<Cifar10Batch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_batch())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    use super::*;
    use crate::{IMAGE_SIZE, NUM_CHANNELS};

    type TestBackend = NdArray;

    fn records(count: usize, label_offset: u8) -> Vec<Cifar10Record> {
        (0..count)
            .map(|i| {
                let image = (0..32 * 32 * 3).map(|p| ((p * 7 + i * 13) % 256) as u8).collect();
                Cifar10Record::new(image, 32, 32, (i as u8 + label_offset) % 10).unwrap()
            })
            .collect()
    }

    fn labels(batch: Cifar10Batch<TestBackend>) -> Vec<i64> {
        batch
            .labels
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .unwrap()
    }

    #[test]
    fn sampler_visits_every_index_once_per_pass() {
        let mut sampler = RepeatSampler::new(7, true, 3);
        for _ in 0..3 {
            let pass: HashSet<usize> = (0..7).map(|_| sampler.next_index()).collect();
            assert_eq!(pass, (0..7).collect());
        }
    }

    #[test]
    fn sampler_without_shuffle_keeps_source_order() {
        let mut sampler = RepeatSampler::new(3, false, 0);
        let order: Vec<usize> = (0..7).map(|_| sampler.next_index()).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn batches_have_fixed_shape_across_pass_boundaries() {
        let device = NdArrayDevice::Cpu;
        let dataset = Arc::new(Cifar10Dataset::from_records(Split::Train, records(7, 0)));
        let config = InputConfig::new().with_seed(Some(1)).with_num_parallel_calls(3);
        let mut pipeline = InputPipeline::<TestBackend>::new(
            dataset,
            DataPreprocessor::training(),
            3,
            &config,
            &device,
        )
        .unwrap();

        for _ in 0..10 {
            let batch = pipeline.next_batch().unwrap();
            assert_eq!(batch.images.dims(), [3, IMAGE_SIZE, IMAGE_SIZE, NUM_CHANNELS]);
            assert_eq!(batch.labels.dims(), [3]);
        }
    }

    #[test]
    fn unshuffled_stream_wraps_in_source_order() {
        let device = NdArrayDevice::Cpu;
        let dataset = Arc::new(Cifar10Dataset::from_records(Split::Test, records(4, 0)));
        let config = InputConfig::new().with_seed(Some(0));
        let pipeline = InputPipeline::<TestBackend>::new(
            dataset,
            DataPreprocessor::evaluation(),
            3,
            &config,
            &device,
        )
        .unwrap();

        let seen: Vec<i64> = pipeline
            .take(3)
            .flat_map(|batch| labels(batch.unwrap()))
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 3, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn fixed_seed_reproduces_batches() {
        let device = NdArrayDevice::Cpu;
        let dataset = Arc::new(Cifar10Dataset::from_records(Split::Train, records(9, 0)));
        let config = InputConfig::new().with_seed(Some(1234));

        let collect = || {
            let pipeline = InputPipeline::<TestBackend>::new(
                Arc::clone(&dataset),
                DataPreprocessor::training(),
                4,
                &config,
                &device,
            )
            .unwrap();
            pipeline
                .take(3)
                .map(|batch| batch.unwrap().images.into_data().to_vec::<f32>().unwrap())
                .collect::<Vec<_>>()
        };

        assert_eq!(collect(), collect());
    }

    #[test]
    fn worker_count_does_not_change_seeded_batches() {
        let device = NdArrayDevice::Cpu;
        let dataset = Arc::new(Cifar10Dataset::from_records(Split::Train, records(11, 0)));

        let collect = |workers: usize| {
            let config = InputConfig::new()
                .with_seed(Some(99))
                .with_num_parallel_calls(workers);
            let pipeline = InputPipeline::<TestBackend>::new(
                Arc::clone(&dataset),
                DataPreprocessor::training(),
                5,
                &config,
                &device,
            )
            .unwrap();
            pipeline
                .take(4)
                .map(|batch| {
                    let batch = batch.unwrap();
                    let images = batch.images.into_data().to_vec::<f32>().unwrap();
                    let labels = batch.labels.into_data().convert::<i64>().to_vec::<i64>().unwrap();
                    (images, labels)
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(collect(1), collect(7));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let device = NdArrayDevice::Cpu;
        let dataset = Arc::new(Cifar10Dataset::from_records(Split::Train, records(2, 0)));
        let result = InputPipeline::<TestBackend>::new(
            dataset,
            DataPreprocessor::training(),
            0,
            &InputConfig::new(),
            &device,
        );
        assert!(matches!(
            result,
            Err(Cifar10Error::InvalidBatchSize { batch_size: 0 })
        ));
    }

    #[test]
    fn empty_split_is_rejected() {
        let device = NdArrayDevice::Cpu;
        let dataset = Arc::new(Cifar10Dataset::from_records(Split::Test, Vec::new()));
        let result = InputPipeline::<TestBackend>::new(
            dataset,
            DataPreprocessor::evaluation(),
            2,
            &InputConfig::new(),
            &device,
        );
        assert!(matches!(result, Err(Cifar10Error::EmptyDataset { .. })));
    }

    #[test]
    fn preprocessing_errors_reach_the_caller() {
        let device = NdArrayDevice::Cpu;
        let small = Cifar10Record::new(vec![0; 8 * 8 * 3], 8, 8, 1).unwrap();
        let dataset = Arc::new(Cifar10Dataset::from_records(Split::Train, vec![small]));
        let mut pipeline = InputPipeline::<TestBackend>::new(
            dataset,
            DataPreprocessor::training(),
            2,
            &InputConfig::new(),
            &device,
        )
        .unwrap();

        assert!(matches!(
            pipeline.next_batch(),
            Err(Cifar10Error::ImageTooSmall { .. })
        ));
    }
}
