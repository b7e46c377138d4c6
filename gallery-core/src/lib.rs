pub mod article;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod feed;
pub mod presenter;
pub mod transport;

pub use article::{Article, ArticleList, Author, Avatar, MetaData};
pub use cache::{DictionaryImageDataCache, ImageDataCache, SharedImageCache};
pub use config::{FeedConfig, GalleryConfig, ImageConfig, UiConfig};
pub use coordinator::{CoordinatorOptions, FetchCoordinator, FetchHandle};
pub use error::GalleryError;
pub use feed::{spawn_article_loader, ArticleFeedClient, Event, LoaderHandle};
pub use presenter::{ArticleDisplay, ArticlePresenter, ImageSlot, PresenterEvent};
pub use transport::{HttpTransport, ImageTransport, SharedTransport};
