use super::{EncodeOptions, ImageCodec, ResizeSpec};
use crate::models::ImageMetadata;
use crate::{Error, Result};
use std::sync::{Arc, Mutex};

/// Handle produced by [`MockCodec`]; carries only dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockHandle {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone)]
pub struct MockCodec {
    width: u32,
    height: u32,
    output_len: usize,
    fail_decode: bool,
    fail_encode: bool,
    decode_count: Arc<Mutex<usize>>,
    resizes: Arc<Mutex<Vec<ResizeSpec>>>,
    encodes: Arc<Mutex<Vec<EncodeOptions>>>,
}

impl MockCodec {
    pub fn new() -> Self {
        Self {
            width: 800,
            height: 600,
            output_len: 100,
            fail_decode: false,
            fail_encode: false,
            decode_count: Arc::new(Mutex::new(0)),
            resizes: Arc::new(Mutex::new(Vec::new())),
            encodes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_output_len(mut self, output_len: usize) -> Self {
        self.output_len = output_len;
        self
    }

    pub fn with_decode_failure(mut self, should_fail: bool) -> Self {
        self.fail_decode = should_fail;
        self
    }

    pub fn with_encode_failure(mut self, should_fail: bool) -> Self {
        self.fail_encode = should_fail;
        self
    }

    pub fn get_decode_count(&self) -> usize {
        *self.decode_count.lock().unwrap()
    }

    pub fn get_resizes(&self) -> Vec<ResizeSpec> {
        self.resizes.lock().unwrap().clone()
    }

    pub fn get_encodes(&self) -> Vec<EncodeOptions> {
        self.encodes.lock().unwrap().clone()
    }
}

impl Default for MockCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for MockCodec {
    type Handle = MockHandle;

    fn decode(&self, _bytes: &[u8]) -> Result<MockHandle> {
        *self.decode_count.lock().unwrap() += 1;

        if self.fail_decode {
            return Err(Error::Codec("Mock decode failure".to_string()));
        }

        Ok(MockHandle {
            width: self.width,
            height: self.height,
        })
    }

    fn metadata(&self, handle: &MockHandle) -> ImageMetadata {
        ImageMetadata {
            width: handle.width,
            height: handle.height,
        }
    }

    fn resize(&self, handle: MockHandle, spec: ResizeSpec) -> Result<MockHandle> {
        self.resizes.lock().unwrap().push(spec);

        let (width, height) = spec.target_dimensions(self.metadata(&handle));
        Ok(MockHandle { width, height })
    }

    fn encode(&self, _handle: &MockHandle, options: &EncodeOptions) -> Result<Vec<u8>> {
        self.encodes.lock().unwrap().push(*options);

        if self.fail_encode {
            return Err(Error::Codec("Mock encode failure".to_string()));
        }

        Ok(vec![0u8; self.output_len])
    }
}
