mod engagement;
mod post;
mod user;

pub use engagement::{
    Comment, CommentResponse, CreateCommentRequest, Like, LikeOutcome, NewViewEvent,
    PostSummary, UpdateCommentRequest, UserComment, ViewEvent,
};
pub use post::{
    CreatePostRequest, ListPostsQuery, Post, PostFilter, PostPage, PostResponse, SortOrder,
    UpdatePostRequest,
};
pub use user::{
    Category, Credentials, LoginRequest, NewUser, RegisterRequest, TokenResponse,
    UpdateUserRequest, User,
};
