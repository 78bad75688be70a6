//! Card queries.

use futures_util::future::BoxFuture;

use http::Method;

use packrat_model::response::card::CardResponse;

use crate::http::Client;

use anyhow::Error;

/// Gets a card by its global id, like `swsh3-136`.
#[derive(Debug)]
pub struct GetCard {
    client: Client,
    id: String,
}

impl GetCard {
    /// Creates a new `GetCard`.
    pub fn new(client: Client, id: String) -> GetCard {
        GetCard { client, id }
    }
}

impl IntoFuture for GetCard {
    type Output = Result<CardResponse, Error>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let request = self
                .client
                .request(Method::GET, format!("/cards/{}", self.id))
                .send()
                .await?;

            Ok(request.json().await?)
        })
    }
}
