use std::thread;
use std::sync::mpsc;
use std::sync::Arc;

use log::{ debug, info, warn };
use parking_lot::Mutex;

use crate::canvas::Canvas;
use crate::renderer::Renderer;
use crate::sampler::LocalScopes;

pub enum Message {
    Pixel(usize, usize),
    Terminate,
}

struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, renderer: Arc<Renderer>, canvas: Arc<Mutex<Canvas>>,
        receiver: Arc<Mutex<mpsc::Receiver<Message>>>) -> Worker {

        let thread = thread::spawn(move || {
            // Refinement scopes are recycled across every pixel this worker
            // renders.
            let mut scopes = LocalScopes::new();
            let mut rendered = 0usize;

            loop {
                // Hold the receiver lock only while waiting for a message.
                let message = receiver.lock().recv();

                match message {
                    Ok(Message::Pixel(x, y)) => {
                        let color = renderer.render_pixel_with(x, y, &mut scopes);
                        canvas.lock().write_pixel(x, y, &color);
                        rendered += 1;
                    },

                    // A closed channel means the pool is gone.
                    Ok(Message::Terminate) | Err(_) => break,
                }
            }

            debug!("worker {} finished after {} pixels", id, rendered);
        });

        Worker { id, thread: Some(thread) }
    }
}

/// A fixed set of threads rendering pixels into a shared canvas.
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: mpsc::Sender<Message>,
}

impl ThreadPool {
    /// Starts `size` workers; at least one is always started.
    pub fn new(size: usize, renderer: Arc<Renderer>, canvas: Arc<Mutex<Canvas>>)
        -> ThreadPool {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(Worker::new(
                id,
                Arc::clone(&renderer),
                Arc::clone(&canvas),
                Arc::clone(&receiver)
            ));
        }

        debug!("started {} workers", size);
        ThreadPool { workers, sender }
    }

    pub fn execute(&mut self, message: Message) {
        if self.sender.send(message).is_err() {
            warn!("every worker has exited; message dropped");
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            // Workers that already exited cannot receive; that is fine.
            let _ = self.sender.send(Message::Terminate);
        }

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    warn!("worker {} panicked", worker.id);
                }
            }
        }
    }
}

/// Renders every pixel of `renderer` using `threads` workers.
///
/// All workers share the renderer, and with it one sample cache, so a corner
/// sampled by one thread is reused by the thread rendering the neighbouring
/// pixel.
pub fn render(renderer: Arc<Renderer>, threads: usize) -> Canvas {
    let (hsize, vsize) = (renderer.camera.hsize, renderer.camera.vsize);
    let canvas = Arc::new(Mutex::new(Canvas::new(hsize, vsize)));

    info!("rendering {}x{} using {} threads ({:?})",
          hsize, vsize, threads.max(1), renderer.sampling);
    {
        let mut pool = ThreadPool::new(threads, Arc::clone(&renderer), Arc::clone(&canvas));

        for y in 0..vsize {
            for x in 0..hsize {
                pool.execute(Message::Pixel(x, y));
            }
        }
    }

    debug!("{} shared samples cached", renderer.cache().len());
    info!("render finished");

    let image = canvas.lock().clone();
    image
}

#[cfg(test)]
use crate::camera::Camera;
#[cfg(test)]
use crate::color::Color;
#[cfg(test)]
use crate::matrix::Matrix4D;
#[cfg(test)]
use crate::sampler::Sampling;
#[cfg(test)]
use crate::tuple::Tuple4D;
#[cfg(test)]
use crate::world::World;

#[cfg(test)]
fn renderer(sampling: Sampling) -> Renderer {
    let transform = Matrix4D::view_transform(
        Tuple4D::point(0.0, 0.0, -5.0),
        Tuple4D::point(0.0, 0.0, 0.0),
        Tuple4D::vector(0.0, 1.0, 0.0),
    );
    let camera = Camera::new(11, 11, std::f64::consts::PI / 2.0, transform).unwrap();

    Renderer::new(camera, World::default(), 5, sampling)
}

#[test]
fn parallel_render_matches_sequential_render() {
    let sampling = Sampling::Adaptive { max_passes: 3, max_delta: 0.05 };

    let sequential = renderer(sampling).render();
    let parallel = render(Arc::new(renderer(sampling)), 4);

    assert_eq!(sequential, parallel);
}

#[test]
fn parallel_render_of_default_world() {
    let image = render(Arc::new(renderer(Sampling::Direct)), 3);

    assert_eq!(image.read_pixel(5, 5).unwrap(), Color::rgb(0.38066, 0.47583, 0.2855));
}

#[test]
fn zero_threads_still_renders() {
    let image = render(Arc::new(renderer(Sampling::Direct)), 0);

    assert_eq!((image.width, image.height), (11, 11));
}
