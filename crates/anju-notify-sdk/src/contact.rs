//! 联系记录模块
//!
//! 联系资源本体由后台 CRUD 层持有，本模块只建模 SDK 可见的切片：
//! 状态枚举、状态迁移对计数的影响、以及按时间窗口重算计数。

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::counters::NotificationCounters;

/// 联系状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    /// 新联系，未处理
    New,
    /// 已读
    Read,
    /// 已回复
    Responded,
    /// 已归档
    Archived,
}

impl ContactStatus {
    /// 是否为未处理状态
    pub fn is_new(&self) -> bool {
        matches!(self, ContactStatus::New)
    }

    /// 状态迁移是否离开 new
    ///
    /// 只有这类迁移影响计数；read / responded / archived 之间的
    /// 迁移与计数无关。
    pub fn leaves_new(previous: ContactStatus, next: ContactStatus) -> bool {
        previous.is_new() && !next.is_new()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Read => "read",
            ContactStatus::Responded => "responded",
            ContactStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 联系记录（SDK 可见切片）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    /// 联系 ID
    pub id: u64,
    /// 当前状态
    pub status: ContactStatus,
    /// 创建时间（UTC）
    pub created_at: DateTime<Utc>,
}

/// recent 窗口：24 小时
pub const RECENT_WINDOW_HOURS: i64 = 24;

/// weekly 窗口：7 天
pub const WEEKLY_WINDOW_DAYS: i64 = 7;

/// 按权威联系数据重算计数三元组
///
/// 三个计数都只统计 status = new 的记录；recent / weekly 再按创建
/// 时间过滤。窗口边界取闭区间：恰好落在边界上的记录仍计入。
pub fn count_unread(contacts: &[ContactRecord], now: DateTime<Utc>) -> NotificationCounters {
    let recent_cutoff = now - Duration::hours(RECENT_WINDOW_HOURS);
    let weekly_cutoff = now - Duration::days(WEEKLY_WINDOW_DAYS);

    let mut counters = NotificationCounters::zero();
    for contact in contacts {
        if !contact.status.is_new() {
            continue;
        }
        counters.new += 1;
        if contact.created_at >= recent_cutoff {
            counters.recent += 1;
        }
        if contact.created_at >= weekly_cutoff {
            counters.weekly += 1;
        }
    }
    counters
}
