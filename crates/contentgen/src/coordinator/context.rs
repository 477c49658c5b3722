use crate::generation::TargetDay;
use crate::model::{Collection, JobDescriptor, WorkingSet};

pub struct JobContext {
    pub job: JobDescriptor,

    // In-memory tree. Mirrors the store except for at most one in-flight
    // batch or block.
    pub collection: Collection,

    pub working_set: WorkingSet,

    // Text phase shortfall as (processed days, total days)
    pub text_shortfall: Option<(usize, usize)>,

    pub images_generated: usize,
    pub images_skipped: usize,
}

impl JobContext {
    pub fn new(job: JobDescriptor, collection: Collection) -> Self {
        let working_set = WorkingSet::resolve(&collection, job.scope.as_ref());
        Self {
            job,
            collection,
            working_set,
            text_shortfall: None,
            images_generated: 0,
            images_skipped: 0,
        }
    }

    /// Days the text phase generates copy for. Unless the job overwrites,
    /// only in-scope blocks without copy are targeted and days with nothing
    /// left to write are dropped.
    pub fn text_targets(&self) -> Vec<TargetDay> {
        self.working_set
            .day_indices()
            .into_iter()
            .filter_map(|day_index| {
                let day = self.collection.days.get(day_index)?;
                let block_indices: Vec<usize> = self
                    .working_set
                    .blocks_of(day_index)
                    .into_iter()
                    .filter(|b| {
                        self.job.overwrite || day.blocks.get(*b).is_some_and(|blk| !blk.has_text())
                    })
                    .collect();
                if block_indices.is_empty() {
                    return None;
                }
                Some(TargetDay {
                    day_index,
                    day: day.clone(),
                    block_indices,
                })
            })
            .collect()
    }

    /// In-scope blocks with a prompt and no image, in day/block order.
    pub fn image_targets(&self) -> Vec<(usize, usize)> {
        self.working_set
            .blocks
            .iter()
            .copied()
            .filter(|(d, b)| self.collection.block(*d, *b).is_some_and(|blk| blk.needs_image()))
            .collect()
    }
}
