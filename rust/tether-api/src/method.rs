use std::{future::Future, marker::PhantomData, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tether_common::{BoxedFuture, ConditionalSend, ConditionalSync, boxed};
use tether_schema::{Data, Descriptor};

use crate::ApiError;

/// A type-erased method handler
pub(crate) trait Handler<C>: ConditionalSync {
    fn call(&self, input: Value, context: &C) -> BoxedFuture<'static, Result<Data, ApiError>>;
}

pub(crate) struct HandlerFn<F, I, O, Fut> {
    handler: F,
    types: PhantomData<fn(I) -> (O, Fut)>,
}

impl<F, I, O, Fut> HandlerFn<F, I, O, Fut> {
    pub(crate) fn new(handler: F) -> Self {
        Self {
            handler,
            types: PhantomData,
        }
    }
}

impl<C, F, I, O, Fut> Handler<C> for HandlerFn<F, I, O, Fut>
where
    F: Fn(I, &C) -> Fut + ConditionalSync,
    I: DeserializeOwned,
    O: Into<Data>,
    Fut: Future<Output = Result<O, ApiError>> + ConditionalSend + 'static,
{
    fn call(&self, input: Value, context: &C) -> BoxedFuture<'static, Result<Data, ApiError>> {
        let input = match serde_json::from_value::<I>(input) {
            Ok(input) => input,
            Err(error) => {
                let error = ApiError::from(error);
                return boxed(async move { Err(error) });
            }
        };
        let output = (self.handler)(input, context);
        boxed(async move { output.await.map(Into::into) })
    }
}

pub(crate) struct Method<C> {
    pub(crate) input: Option<Descriptor<C>>,
    pub(crate) output: Descriptor<C>,
    pub(crate) handler: Arc<dyn Handler<C>>,
}
