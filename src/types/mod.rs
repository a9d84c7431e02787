//! Domain and wire types shared by the clients and the pipeline.

pub mod consent;
pub mod event;
pub mod identity;
pub mod submission;

pub use consent::{
    AgeGroup, ConsentFilter, ConsentRecord, ConsentRecordList, ConsentStatus, GrantorType,
    NewConsentRecord, Pagination,
};
pub use event::{DiscountCodeRequest, ProfileEvent, SurveyCompletedData};
pub use identity::{Identifiers, Profile, ProfileIdType, User};
pub use submission::{Answer, RawAnswer, Submission, ANSWER_DECODERS};
