mod image_caption;

pub use image_caption::*;

/// A loaded model that turns one input item into one output.
pub trait Model {
    type Item;
    type Output;

    fn process(
        &mut self,
        item: Self::Item,
    ) -> impl std::future::Future<Output = anyhow::Result<Self::Output>> + Send;
}
