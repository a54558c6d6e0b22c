//! Whole-mesh scenarios: several node contexts in one process.

use std::time::Duration;

use tokio::time;
use weft_core::{Address, Cost, NodeId, PortId};
use weft_link::MemoryHub;
use weft_node::{NodeConfig, NodeContext, StreamError};

async fn spawn_node(hub: &MemoryHub, address: Address) -> NodeContext {
    let context = NodeContext::new(Cost::ZERO).await;
    hub.attach(context.mux(), address).await;
    context
}

async fn settle() {
    time::sleep(Duration::from_millis(100)).await;
}

async fn link(from: &NodeContext, to: Address, cost: Cost) {
    from.neighbors().send_hello(to, cost).await.unwrap();
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn hello_exchange_builds_symmetric_neighbor_tables() {
    let hub = MemoryHub::new();
    let a = spawn_node(&hub, Address::Serial(1)).await;
    let b = spawn_node(&hub, Address::Serial(2)).await;
    settle().await;

    link(&a, Address::Serial(2), Cost::new(5)).await;

    let a_table = a.neighbors().table();
    let b_table = b.neighbors().table();
    assert_eq!(a_table.cost(NodeId::Serial(2)).await, Some(Cost::new(5)));
    assert_eq!(b_table.cost(NodeId::Serial(1)).await, Some(Cost::new(5)));
    assert_eq!(
        a_table.resolve_addresses(NodeId::Serial(2)).await,
        vec![Address::Serial(2)]
    );
}

#[tokio::test(start_paused = true)]
async fn discovery_finds_the_two_hop_gateway() {
    let hub = MemoryHub::new();
    let a = spawn_node(&hub, Address::Serial(1)).await;
    let b = spawn_node(&hub, Address::Serial(2)).await;
    let _c = spawn_node(&hub, Address::Serial(3)).await;
    settle().await;

    link(&a, Address::Serial(2), Cost::new(5)).await;
    link(&b, Address::Serial(3), Cost::new(3)).await;

    let resolution = a
        .router()
        .resolve_gateway(NodeId::Serial(3))
        .await
        .expect("no route to C");
    assert_eq!(resolution.gateway, NodeId::Serial(2));
    assert_eq!(resolution.cost, Cost::new(8));
}

#[tokio::test(start_paused = true)]
async fn trusted_stream_crosses_the_mesh() {
    let hub = MemoryHub::new();
    let a = spawn_node(&hub, Address::Serial(1)).await;
    let b = spawn_node(&hub, Address::Serial(2)).await;
    let c = spawn_node(&hub, Address::Serial(3)).await;
    settle().await;

    link(&a, Address::Serial(2), Cost::new(5)).await;
    link(&b, Address::Serial(3), Cost::new(3)).await;

    // A and C are not neighbors; every frame relays through B.
    let (client, server) = tokio::join!(
        a.connect_stream(NodeId::Serial(3), PortId::new(40), PortId::new(80)),
        c.accept_stream(NodeId::Serial(1), PortId::new(80), PortId::new(40)),
    );
    let client = client.unwrap();
    let mut server = server.unwrap();
    let mut received = server.take_receiver();

    client.send(b"across the mesh".to_vec()).await.unwrap();
    assert_eq!(received.recv().await, Some(b"across the mesh".to_vec()));

    server.send(b"and back".to_vec()).await.unwrap();
    let mut client = client;
    let mut replies = client.take_receiver();
    assert_eq!(replies.recv().await, Some(b"and back".to_vec()));

    client.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn one_stream_per_remote_node() {
    let hub = MemoryHub::new();
    let a = spawn_node(&hub, Address::Serial(1)).await;
    let b = spawn_node(&hub, Address::Serial(2)).await;
    settle().await;
    link(&a, Address::Serial(2), Cost::new(1)).await;

    let (client, _server) = tokio::join!(
        a.connect_stream(NodeId::Serial(2), PortId::new(40), PortId::new(80)),
        b.accept_stream(NodeId::Serial(1), PortId::new(80), PortId::new(40)),
    );
    let _client = client.unwrap();

    let second = a
        .connect_stream(NodeId::Serial(2), PortId::new(41), PortId::new(81))
        .await;
    assert!(matches!(
        second,
        Err(StreamError::Busy { remote: NodeId::Serial(2) })
    ));
}

#[tokio::test]
async fn configured_nodes_meet_over_udp() {
    let config = NodeConfig::parse(
        r#"
[[media.udp]]
name = "loop"
bind = "127.0.0.1:0"
"#,
    )
    .unwrap();

    let mut a = NodeContext::start(&config).await.unwrap();
    let mut b = NodeContext::start(&config).await.unwrap();
    let addr_a = a.mux().local_addresses().await[0];
    let addr_b = b.mux().local_addresses().await[0];

    a.neighbors().send_hello(addr_b, Cost::new(1)).await.unwrap();
    time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        b.neighbors().table().cost(NodeId::from(addr_a)).await,
        Some(Cost::new(1))
    );
    assert_eq!(
        a.neighbors().table().cost(NodeId::from(addr_b)).await,
        Some(Cost::new(1))
    );

    a.stop().await;
    b.stop().await;
}
