pub use std::{collections::HashMap, sync::Arc, time::Duration};

pub use anyhow::Context;
pub use async_trait::async_trait;
pub use chrono::{NaiveDateTime as DateTime, TimeDelta, Utc};
pub use dashmap::DashSet;
pub use sea_orm::{
  ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
  DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
  QuerySelect, Set, TransactionTrait,
};
pub use tokio::time;
pub use tracing::{debug, error, info, warn};

pub use crate::error::{Error, Result};
pub(crate) use crate::utils;
