mod handler;
mod model;

pub use handler::{
    create_post,
    delete_post,
    featured_posts,
    get_post,
    list_posts,
    record_view,
    toggle_publish,
    trending_posts,
    update_post,
};
