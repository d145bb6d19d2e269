use burn::prelude::*;
use burn::tensor::TensorData;

use crate::env::{
    action::{Action, DriveCommand},
    camera::Observation,
};

pub trait ToTensorF<const D: usize>: Clone {
    fn to_tensor<B: Backend>(self, device: &B::Device) -> Tensor<B, D>;
}

// (height, width, channels), pixel values scaled to [0, 1]
impl ToTensorF<3> for Observation {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 3> {
        let (h, w, c) = self.dim();
        let data: Vec<f32> = self.iter().map(|px| *px as f32 / 255.0).collect();

        Tensor::from_data(
            TensorData::new(data, [h, w, c]).convert::<B::FloatElem>(),
            device,
        )
    }
}

impl ToTensorF<4> for Vec<Observation> {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 4> {
        let frames: Vec<Tensor<B, 3>> = self.into_iter().map(|o| o.to_tensor(device)).collect();

        Tensor::stack(frames, 0)
    }
}

impl ToTensorF<1> for DriveCommand {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 1> {
        Tensor::from_floats([self.steering, self.throttle], device)
    }
}

/// `[steering, throttle]`; a discrete action becomes its index. Use
/// [`ToTensorI`] on the index where an `Int` tensor is needed.
impl ToTensorF<1> for Action {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 1> {
        match self {
            Action::Continuous { steering, throttle } => {
                DriveCommand::new(steering, throttle).to_tensor(device)
            }
            Action::Discrete(idx) => Tensor::from_floats([idx as f32], device),
        }
    }
}

pub trait ToTensorI<const D: usize>: Clone {
    fn to_tensor<B: Backend>(self, device: &B::Device) -> Tensor<B, D, Int>;
}

impl ToTensorI<1> for usize {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 1, Int> {
        Tensor::from_ints([self as i32], device)
    }
}

impl ToTensorI<1> for Vec<usize> {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 1, Int> {
        let n = self.len();
        let data: Vec<i32> = self.into_iter().map(|x| x as i32).collect();

        Tensor::from_data(TensorData::new(data, [n]).convert::<B::IntElem>(), device)
    }
}
