mod report_dto;

pub use report_dto::{EvidenceResponseDto, MyReportsParams, SubmitReportDto, UploadEvidenceDto};
