use std::sync::Arc;

use super::{build_cache_key, DeviceRequest};
use crate::error::Result;
use crate::pipelines::cache::{global_cache, ModelOptions};
use crate::pipelines::masked_lm::model::PretrainedMaskedLm;

/// Model options plus the device they should be loaded onto.
pub struct StandardPipelineBuilder<Opts> {
    pub(crate) options: Opts,
    pub(crate) device_request: DeviceRequest,
}

impl<Opts> StandardPipelineBuilder<Opts> {
    pub fn new(options: Opts) -> Self {
        Self {
            options,
            device_request: DeviceRequest::Cpu,
        }
    }

    pub(crate) fn device_request_mut(&mut self) -> &mut DeviceRequest {
        &mut self.device_request
    }
}

impl<Opts: ModelOptions + Clone> StandardPipelineBuilder<Opts> {
    /// Resolves the device, then loads the model through the global cache and
    /// fetches its tokenizer.
    pub fn load<M>(&self) -> Result<(Arc<M>, tokenizers::Tokenizer)>
    where
        M: PretrainedMaskedLm<Options = Opts> + Send + Sync + 'static,
    {
        let device = self.device_request.clone().resolve()?;
        let key = build_cache_key(&self.options, &device);

        let model = global_cache().get_or_create(&key, || {
            M::new(self.options.clone(), device.clone())
        })?;
        let tokenizer = M::get_tokenizer(self.options.clone())?;

        Ok((model, tokenizer))
    }
}
