// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod helpers;
pub mod robots_test;
pub mod scrape_pipeline_test;
pub mod service_lifecycle_test;
