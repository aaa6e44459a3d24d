mod notification_dto;

pub use notification_dto::{
    AnnouncementDto, BroadcastResultDto, MarkAllReadDto, NotificationListParams, UnreadCountDto,
    UpdatePreferencesDto,
};
