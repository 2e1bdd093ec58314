// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! `OpenAPI` document for the HTTP surface

use shared_types::{
    Attributes, MediaType, NftChild, NftCollection, NftItem, NftSnapshot, SerialNumber,
    SourceFamily, SourceOutcome, SourceReport, SourceSpecificData,
};
use utoipa::OpenApi;

use crate::{
    routes::handlers,
    config::Environment,
    state::{HealthCheck, HealthStatus},
};

/// API documentation root
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "NFT API",
        description = "Aggregates NFT ownership across Substrate and EVM data sources. \
                       `GET /ws` streams progressive snapshots for an address sent as a text frame.",
        license(name = "Apache-2.0")
    ),
    paths(handlers::health_handler, handlers::nfts_handler),
    components(schemas(
        HealthCheck,
        HealthStatus,
        Environment,
        NftSnapshot,
        NftItem,
        Attributes,
        NftCollection,
        NftChild,
        MediaType,
        SerialNumber,
        SourceFamily,
        SourceOutcome,
        SourceReport,
        SourceSpecificData,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "nfts", description = "Ownership queries")
    )
)]
pub struct ApiDoc;
