use poem::{
    listener::{Acceptor, Listener, TcpListener},
    Endpoint, Server,
};
use url::Url;

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn serve(app: impl Endpoint + 'static) -> Url {
    let acceptor = TcpListener::bind("127.0.0.1:0")
        .into_acceptor()
        .await
        .unwrap();
    let addr = *acceptor.local_addr()[0].as_socket_addr().unwrap();
    tokio::spawn(Server::new_with_acceptor(acceptor).run(app));
    Url::parse(&format!("http://{addr}/")).unwrap()
}
