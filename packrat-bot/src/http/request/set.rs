//! Set queries.

use futures_util::future::BoxFuture;

use http::Method;

use packrat_model::response::card::{SetBrief, SetResponse};

use crate::http::Client;

use anyhow::Error;

/// Gets a set with its card list.
#[derive(Debug)]
pub struct GetSet {
    client: Client,
    id: String,
}

impl GetSet {
    /// Creates a new `GetSet`.
    pub fn new(client: Client, id: String) -> GetSet {
        GetSet { client, id }
    }
}

impl IntoFuture for GetSet {
    type Output = Result<SetResponse, Error>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let request = self
                .client
                .request(Method::GET, format!("/sets/{}", self.id))
                .send()
                .await?;

            Ok(request.json().await?)
        })
    }
}

/// Lists every set.
#[derive(Debug)]
pub struct ListSets {
    client: Client,
}

impl ListSets {
    /// Creates a new `ListSets`.
    pub fn new(client: Client) -> ListSets {
        ListSets { client }
    }
}

impl IntoFuture for ListSets {
    type Output = Result<Vec<SetBrief>, Error>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let request = self.client.request(Method::GET, "/sets").send().await?;

            Ok(request.json().await?)
        })
    }
}
