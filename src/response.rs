//! Response envelopes: `{"data": ...}`, with `meta` on listings and pages.

use crate::model::{Page, Record};
use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct Data<T> {
    pub data: T,
}

/// A listing with its item count.
#[derive(Serialize)]
pub struct Listing<T> {
    pub data: Vec<T>,
    pub meta: ListingMeta,
}

#[derive(Serialize)]
pub struct ListingMeta {
    pub count: u64,
}

/// One page of records.
#[derive(Serialize)]
pub struct Paged {
    pub data: Vec<Record>,
    pub meta: PageMeta,
}

#[derive(Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub per_page: u32,
    pub current_page: u32,
    pub last_page: u32,
}

/// 200 with `data`.
pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<Data<T>>) {
    (StatusCode::OK, Json(Data { data }))
}

/// 201 with the created record.
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Data<T>>) {
    (StatusCode::CREATED, Json(Data { data }))
}

pub fn listing<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<Listing<T>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(Listing {
            data,
            meta: ListingMeta { count },
        }),
    )
}

pub fn paginated(page: Page) -> (StatusCode, Json<Paged>) {
    let meta = PageMeta {
        total: page.total,
        per_page: page.per_page,
        current_page: page.current_page,
        last_page: page.last_page(),
    };
    (StatusCode::OK, Json(Paged { data: page.data, meta }))
}

/// Delete, attach and detach answer with an empty 202.
pub fn accepted() -> StatusCode {
    StatusCode::ACCEPTED
}
