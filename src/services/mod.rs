pub mod title_service;
pub mod title_service_impl;
pub use title_service::{CatalogError, TitleService};
pub use title_service_impl::DocumentTitleService;

pub mod movie_service;
pub mod movie_service_impl;
pub use movie_service::MovieService;
pub use movie_service_impl::DocumentMovieService;
